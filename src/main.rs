#[actix_web::main]
async fn main() -> std::io::Result<()> {
    docproc_server::run().await
}
