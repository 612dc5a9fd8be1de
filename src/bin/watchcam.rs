// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
//! watchcam
//!
//! 逐帧目标检测 + 监视过滤 + 标注输出
//!
//! 流程:
//! 1. 加载流水线配置与监视偏好
//! 2. 构建 ONNX Runtime 推理后端 + YOLOv10 后处理
//! 3. 逐个读取输入图片, 处理后写出 PNG
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use watchcam::renderer::load_font;
use watchcam::{
    gen_time_string, Annotator, Args, Detector, Frame, FramePipeline, HttpEmailNotifier,
    HttpPreferenceStore, JsonFilePreferenceStore, LogRecordTrigger, OrtBackend, OrtConfig,
    PipelineConfig, PreferenceStore, SettingsService, SharedWatchConfig, YOLOv10Config,
    YOLOv10Postprocessor,
};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

fn collect_sources(source: &Path) -> Result<Vec<PathBuf>> {
    if !source.is_dir() {
        return Ok(vec![source.to_path_buf()]);
    }
    let mut paths: Vec<PathBuf> = fs::read_dir(source)
        .with_context(|| format!("failed to read {}", source.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    if paths.is_empty() {
        bail!("no images found in {}", source.display());
    }
    Ok(paths)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = PipelineConfig::load(&args.config);
    let conf = args.conf.unwrap_or(config.confidence_threshold);

    // ========== 推理后端 ==========
    let mut ort_config = OrtConfig::new(&args.model);
    ort_config.intra_threads = args.threads;
    let engine = OrtBackend::build(ort_config)
        .with_context(|| format!("failed to load model {}", args.model.display()))?;
    let detector = Detector::new(
        engine,
        YOLOv10Postprocessor::new(YOLOv10Config {
            iou: config.nms_iou,
        }),
    );

    // ========== 监视设置 ==========
    let shared = SharedWatchConfig::default();
    let store: Box<dyn PreferenceStore> = match &args.prefs_file {
        Some(path) => Box::new(JsonFilePreferenceStore::new(path)),
        None => Box::new(HttpPreferenceStore::new(
            &args.prefs_load_url,
            &args.prefs_save_url,
            &args.token,
        )),
    };
    let settings = SettingsService::new(store, shared.clone());
    info!(status = %settings.load(), "settings");

    // ========== 流水线 ==========
    let font = args.font.clone().or_else(|| config.font.clone());
    let notifier = HttpEmailNotifier::new(
        &args.email_url,
        &args.token,
        Duration::from_secs(config.notification_timeout_secs),
    )
    .context("failed to start notifier")?;
    let mut pipeline = FramePipeline::new(detector, shared)
        .with_annotator(Annotator::new(load_font(font.as_deref())))
        .with_notifier(Box::new(notifier))
        .with_recorder(Box::new(LogRecordTrigger))
        .with_display_size(config.display_width, config.display_height)
        .with_notify_policy(config.notify_policy);

    let sources = collect_sources(&args.source)?;
    let out_dir = args.output.join(gen_time_string("-"));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    info!(frames = sources.len(), conf, out = %out_dir.display(), "start");

    for (idx, path) in sources.iter().enumerate() {
        // 读不出来的帧按缺帧处理
        let frame = match image::open(path) {
            Ok(img) => Some(Frame::from_rgb_image(img.to_rgb8())),
            Err(e) => {
                warn!(src = %path.display(), error = %e, "unreadable frame");
                None
            }
        };
        let out = pipeline.process_or_fallback(frame.as_ref(), conf);

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("frame_{:06}", idx));
        let dst = out_dir.join(format!("{}.png", stem));
        out.frame
            .to_rgb_image()
            .save(&dst)
            .with_context(|| format!("failed to write {}", dst.display()))?;

        info!(
            src = %path.display(),
            detections = out.detections.len(),
            counters = %out.counters,
            "frame"
        );
    }

    info!(out = %out_dir.display(), "done");
    Ok(())
}
