#[tokio::main]
async fn main() {
    catdog::start_server().await;
}
