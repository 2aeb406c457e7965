use tracing::error;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    todo_web::init_tracing();

    if let Err(e) = todo_web::run_server().await {
        error!("run server error: {e}");
        std::process::exit(1);
    };
}
