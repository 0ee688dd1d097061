use anyhow::{bail, Context, Result};
use exam_tutor::models::ImagePayload;
use exam_tutor::utils::logging;
use exam_tutor::{AppError, Config, ForceMode, Pipeline};

const CONFIG_PATH: &str = "exam_tutor.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load(CONFIG_PATH)?;

    // 初始化日志
    logging::init(config.verbose_logging);
    logging::log_startup(&config);

    // 参数: <图片路径> [框选数量] [full|mistakes]
    let mut args = std::env::args().skip(1);
    let Some(image_path) = args.next() else {
        bail!("用法: exam_tutor <图片路径> [框选数量] [full|mistakes]");
    };
    let user_marks: usize = match args.next() {
        Some(raw) => raw.parse().with_context(|| format!("框选数量无效: {}", raw))?,
        None => 0,
    };
    let force = args
        .next()
        .map(|raw| raw.parse::<ForceMode>())
        .transpose()
        .map_err(anyhow::Error::msg)?;

    let bytes = std::fs::read(&image_path)
        .map_err(|e| AppError::file_read_failed(image_path.clone(), e))?;
    let image = ImagePayload::from_bytes(&bytes, mime_for(&image_path))
        .ok_or_else(|| AppError::from(exam_tutor::error::BusinessError::EmptyImage))?;

    // 初始化并运行流水线
    let pipeline = Pipeline::from_config(&config)?;
    let result = pipeline.smart_analyze(&image, user_marks, force).await;
    logging::log_gateway_stats(&pipeline.gateway().stats());

    match result {
        Ok(analysis) => {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
            Ok(())
        }
        Err(e) => bail!(e.user_message()),
    }
}

fn mime_for(path: &str) -> &'static str {
    let lower = path.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}
