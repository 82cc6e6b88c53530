//! Dashboard flow example - upload, lock remediation and loading
//!
//! Runs the dashboard against a scripted server so the whole flow is visible
//! in the log without a backend:
//!
//! ```text
//! cargo run --example dashboard_flow
//! ```

use std::sync::Mutex;

use sentiview::testing::ScriptedTransport;
use sentiview::{
    AnalysisPayload, ClientConfig, Dashboard, OverlayOutcome, RenderSnapshot, Renderer,
    SubmitOutcome, TracingReporter, TweetQuery, UploadForm,
};
use serde_json::json;

// ============================================================================
// Renderer
// ============================================================================

/// Pretends to draw; charts finish a few checks after the payload arrives.
#[derive(Debug, Default)]
struct ConsoleRenderer {
    snapshot: Mutex<RenderSnapshot>,
    checks: Mutex<u32>,
}

impl Renderer for ConsoleRenderer {
    fn render_payload(&self, payload: &AnalysisPayload) {
        println!(
            "render: {} ({} tweets, {:.1}% positive)",
            payload.title, payload.total_tweets, payload.positive_percent
        );
        let page = payload.query(&TweetQuery::default().with_per_page(3));
        for tweet in page.tweets {
            println!("  @{}: {}", tweet.username, tweet.content);
        }

        let mut snapshot = self.snapshot.lock().unwrap();
        *snapshot = RenderSnapshot {
            total: payload.total_tweets,
            positive: payload.positive_count,
            neutral: payload.neutral_count,
            negative: payload.negative_count,
            hashtags: payload.top_hashtags.len(),
            topics: payload.topics.len(),
            charts_ready: false,
            word_cloud_ready: false,
        };
    }

    fn is_render_complete(&self) -> bool {
        let mut checks = self.checks.lock().unwrap();
        *checks += 1;
        let mut snapshot = self.snapshot.lock().unwrap();
        if *checks >= 4 {
            snapshot.charts_ready = true;
        }
        snapshot.is_render_complete()
    }

    fn dismiss_overlay(&self, outcome: OverlayOutcome) {
        println!("overlay dismissed: {:?}", outcome);
    }

    fn redirect(&self, path: &str) {
        println!("redirect: {}", path);
    }
}

// ============================================================================
// Scripted server
// ============================================================================

fn analysis() -> serde_json::Value {
    json!({
        "title": "Kenaikan harga BBM",
        "total_tweets": 3,
        "positive_count": 1,
        "neutral_count": 1,
        "negative_count": 1,
        "positive_percent": 33.3,
        "top_hashtags": [{"tag": "bbm", "count": 3}],
        "topics": [{"topic": "harga", "frequency": 2}],
        "tweets": [
            {"username": "andi", "content": "Harga naik lagi", "predicted_sentiment": "Negatif"},
            {"username": "budi", "content": "Semoga subsidi tepat sasaran", "predicted_sentiment": "Positif"},
            {"username": "citra", "content": "Cek harga hari ini", "predicted_sentiment": "Netral"}
        ]
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    let transport = ScriptedTransport::new()
        // First upload: an earlier analysis still holds the lock.
        .then_locked(Some("42"))
        // Lock cleanup.
        .then_ok(json!({"status": "success", "message": "Lock checked"}))
        // Second upload: busy once, then analysed.
        .then_busy()
        .then_ok(analysis())
        // Results page load.
        .then_ok(analysis());

    let mut config = ClientConfig::default();
    config.upload.base_delay_ms = 500;

    let dashboard = match Dashboard::new(
        config,
        transport,
        ConsoleRenderer::default(),
        TracingReporter,
    ) {
        Ok(dashboard) => dashboard,
        Err(errors) => {
            for error in errors {
                eprintln!("config: {}", error);
            }
            return;
        }
    };

    let form = UploadForm::new("Kenaikan harga BBM", "bbm.csv", b"username,content\n".to_vec());

    println!("\n=== Upload while locked ===");
    let outcome = dashboard.submit(&form).await;
    println!("outcome: {:?}", outcome);

    if let SubmitOutcome::Failed(error) = &outcome {
        if error.is_locked() {
            println!("\n=== Force unlock ===");
            if let Err(error) = dashboard.force_unlock().await {
                println!("unlock failed: {}", error);
                return;
            }
        }
    }

    println!("\n=== Upload again ===");
    println!("outcome: {:?}", dashboard.submit(&form).await);

    println!("\n=== Load results ===");
    let outcome = dashboard.fetch_results().await;
    if let Some(payload) = outcome.payload() {
        println!("loaded {:?}", payload.title);
    }
}
