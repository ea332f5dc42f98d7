use std::sync::LazyLock;

use derive_from_env::FromEnv;

#[derive(FromEnv)]
#[from_env(prefix = "MLOGCONFIG")]
#[allow(non_snake_case)]
pub struct MLogConfig {
    #[from_env(default = "100")]
    pub FLUSH_INTERVAL_MS: u64,
    #[from_env(default = "32")]
    pub BATCH_SIZE: u64,
}

pub static MLOGCONFIG_CONFIG: LazyLock<MLogConfig> = LazyLock::new(|| {
    MLogConfig::from_env().expect("invalid MLOGCONFIG_* environment variables")
});
