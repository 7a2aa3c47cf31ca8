#[tokio::main]
async fn main() {
    if let Err(error) = calendar_todo::run().await {
        eprintln!("calendar-todo: {error}");
        std::process::exit(1);
    }
}
