mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3333".into())
        .parse()
        .expect("invalid PORT");

    // Base URL used in join/empty announcements, e.g.
    // "https://example.com/bitgrid/#" -> ".../#/a".
    let room_base_url =
        std::env::var("ROOM_BASE_URL").unwrap_or_else(|_| format!("http://localhost:{port}/#"));

    // Announcements are disabled when NOTIFY_WEBHOOK_URL is unset.
    let notifier = services::notify::Notifier::from_env();

    let state = state::AppState::new(notifier, room_base_url);
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "bitgrid listening");
    axum::serve(listener, app).await.expect("server failed");
}
