use blobshow::AppConfig;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    blobshow::run_with_config(AppConfig::new().title("Blob Showcase").size(1280, 720))
}
