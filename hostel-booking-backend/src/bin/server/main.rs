use hostel_booking_backend::error::AppError;
use hostel_booking_backend::run_server;
use hostel_booking_backend::telemetry::setup_tracing;
use hostel_booking_config::get_config;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    setup_tracing();
    let config = get_config()?;
    run_server(config).await
}
