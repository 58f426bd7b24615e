// src/logging.rs

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// トレーシングの設定。組み込み側のmainから一度だけ呼ぶ
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "consent_core=info".into()),
        )
        .with(fmt::layer())
        .init();
}
