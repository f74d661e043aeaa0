/// GET /: liveness text.
pub async fn health() -> &'static str {
    "Concept Server is running."
}
