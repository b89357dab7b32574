use anyhow::Result;
use clap::Parser;
use onnx_classify::{config::Config, config::TensorLayout, web::serve};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "onnx-classify")]
#[command(about = "Upload an image and get the top-k labels from an ONNX classifier")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:5005")]
    bind: String,

    /// Number of worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Model directory path
    #[arg(long, default_value = "models")]
    models_dir: String,

    /// Model name, a subdirectory of the models directory
    #[arg(long, default_value = "mobilenet-v3")]
    model_name: String,

    /// Number of predictions returned by default
    #[arg(long, default_value_t = 10)]
    top_k: usize,

    /// Model input layout: nhwc or nchw
    #[arg(long, default_value = "nhwc")]
    input_layout: String,

    /// Enable development mode
    #[arg(long)]
    dev: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志系统
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    let layout: TensorLayout = args.input_layout.parse()?;
    let config = Config::new(args.bind, args.models_dir, args.model_name, args.workers, args.dev)?
        .with_top_k(args.top_k)?
        .with_input_layout(layout);

    tracing::info!("Starting ONNX image classification service...");
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Model directory: {}", config.model_dir().display());
    tracing::info!("Worker threads: {}", config.workers);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers.max(1))
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))?;

    Ok(())
}
