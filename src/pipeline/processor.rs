// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::time::Instant;

use tracing::{debug, error};

use crate::catalog::ClassCatalog;
use crate::config::NotifyPolicy;
use crate::detection::Detector;
use crate::error::Result;
use crate::frame::{ChannelOrder, Frame};
use crate::models::{Detection, InferenceEngine};
use crate::notify::{LogNotifier, LogRecordTrigger, Notifier, RecordTrigger};
use crate::pipeline::DetectionCounters;
use crate::renderer::Annotator;
use crate::settings::{SharedWatchConfig, WatchConfiguration};

/// 固定显示分辨率
pub const DISPLAY_WIDTH: u32 = 640;
pub const DISPLAY_HEIGHT: u32 = 480;

/// 单帧处理结果
#[derive(Debug, Clone)]
pub struct FrameOutput {
    /// RGB, 显示分辨率
    pub frame: Frame,
    pub counters: DetectionCounters,
    /// 被绘制的 (已监视) 检测, 原图坐标
    pub detections: Vec<Detection>,
}

impl FrameOutput {
    fn blank(width: u32, height: u32) -> Self {
        Self {
            frame: Frame::blank(width, height),
            counters: DetectionCounters::default(),
            detections: Vec::new(),
        }
    }
}

pub struct FramePipeline<E> {
    detector: Detector<E>,
    catalog: ClassCatalog,
    annotator: Annotator,
    settings: SharedWatchConfig,
    notifier: Box<dyn Notifier>,
    recorder: Box<dyn RecordTrigger>,
    display: (u32, u32),
    policy: NotifyPolicy,
    last_good: Option<Frame>,
}

impl<E: InferenceEngine> FramePipeline<E> {
    pub fn new(detector: Detector<E>, settings: SharedWatchConfig) -> Self {
        Self {
            detector,
            catalog: ClassCatalog::coco().clone(),
            annotator: Annotator::default(),
            settings,
            notifier: Box::new(LogNotifier),
            recorder: Box::new(LogRecordTrigger),
            display: (DISPLAY_WIDTH, DISPLAY_HEIGHT),
            policy: NotifyPolicy::default(),
            last_good: None,
        }
    }

    pub fn with_catalog(mut self, catalog: ClassCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_recorder(mut self, recorder: Box<dyn RecordTrigger>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_display_size(mut self, width: u32, height: u32) -> Self {
        self.display = (width, height);
        self
    }

    pub fn with_notify_policy(mut self, policy: NotifyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn detector(&self) -> &Detector<E> {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut Detector<E> {
        &mut self.detector
    }

    pub fn catalog(&self) -> &ClassCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &SharedWatchConfig {
        &self.settings
    }

    /// 使用当前共享配置的快照处理一帧
    pub fn process(&mut self, frame: Option<&Frame>, conf: f32) -> Result<FrameOutput> {
        let watch = self.settings.snapshot();
        self.process_with(frame, conf, &watch)
    }

    /// 处理一帧
    ///
    /// 缺帧时返回显示分辨率的黑帧; 检测/形状/类别错误向调用方传播
    pub fn process_with(
        &mut self,
        frame: Option<&Frame>,
        conf: f32,
        watch: &WatchConfiguration,
    ) -> Result<FrameOutput> {
        let (dw, dh) = self.display;
        let Some(frame) = frame else {
            debug!("absent frame, returning blank");
            return Ok(FrameOutput::blank(dw, dh));
        };

        let t = Instant::now();
        let detections = self.detector.detect(frame, conf)?;

        let mut counters = DetectionCounters::default();
        let mut shown = Vec::with_capacity(detections.len());
        let mut notified: Vec<&str> = Vec::new();
        for det in detections {
            let name = self.catalog.name(det.class_id)?;
            if !watch.is_watched(name) {
                continue;
            }
            shown.push(det);

            let actions = watch.actions(name);
            if actions.count {
                counters.increment(name);
            }
            if actions.notify_on_detect {
                let first = !notified.contains(&name);
                if first || self.policy == NotifyPolicy::PerDetection {
                    self.notifier.notify(name, &watch.notification_email);
                }
                if first {
                    notified.push(name);
                }
            }
            if actions.record_on_detect {
                self.recorder.trigger(name);
            }
        }

        let annotated = self.annotator.annotate(frame, &shown, &self.catalog);
        let annotated = self.annotator.draw_counters(&annotated, &counters);
        let out = annotated.into_order(ChannelOrder::Rgb).resized(dw, dh);

        debug!(
            shown = shown.len(),
            counters = %counters,
            elapsed_ms = t.elapsed().as_secs_f64() * 1000.0,
            "frame processed"
        );

        self.last_good = Some(out.clone());
        Ok(FrameOutput {
            frame: out,
            counters,
            detections: shown,
        })
    }

    /// 处理一帧, 失败时退化为上一帧有效输出 (或黑帧), 不中断视频流
    pub fn process_or_fallback(&mut self, frame: Option<&Frame>, conf: f32) -> FrameOutput {
        match self.process(frame, conf) {
            Ok(out) => out,
            Err(e) => {
                error!(error = %e, "frame processing failed, showing last good frame");
                let (dw, dh) = self.display;
                match &self.last_good {
                    Some(last) => FrameOutput {
                        frame: last.clone(),
                        counters: DetectionCounters::default(),
                        detections: Vec::new(),
                    },
                    None => FrameOutput::blank(dw, dh),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::detector::tests::ScriptedEngine;
    use crate::error::WatchError;
    use crate::models::yolov10::tests::tensor;
    use crate::models::YOLOv10Postprocessor;
    use crate::notify::tests::{RecordingNotifier, RecordingTrigger, SlowSender};
    use crate::notify::HttpEmailNotifier;
    use std::time::Duration;
    use crate::settings::ObjectActions;
    use ndarray::ArrayD;

    const PERSON: usize = 0;
    const CAR: usize = 2;

    fn pipeline(output: ArrayD<f32>) -> (FramePipeline<ScriptedEngine>, RecordingNotifier, RecordingTrigger) {
        let notifier = RecordingNotifier::default();
        let recorder = RecordingTrigger::default();
        let detector = Detector::new(ScriptedEngine::new(output), YOLOv10Postprocessor::default());
        let p = FramePipeline::new(detector, SharedWatchConfig::default())
            .with_notifier(Box::new(notifier.clone()))
            .with_recorder(Box::new(recorder.clone()));
        (p, notifier, recorder)
    }

    fn watching(class: &str, actions: ObjectActions) -> WatchConfiguration {
        let mut cfg = WatchConfiguration::default();
        cfg.watch(class, true).set_actions(class, actions);
        cfg
    }

    fn all_actions() -> ObjectActions {
        ObjectActions {
            count: true,
            notify_on_detect: true,
            record_on_detect: true,
        }
    }

    fn two_cars() -> ArrayD<f32> {
        tensor(
            80,
            &[
                ([0.25, 0.5, 0.2, 0.2], vec![(CAR, 0.8)]),
                ([0.75, 0.5, 0.2, 0.2], vec![(CAR, 0.7)]),
            ],
        )
    }

    #[test]
    fn test_unwatched_person_is_not_drawn() {
        let (mut p, notifier, _) = pipeline(tensor(80, &[([0.5, 0.5, 0.4, 0.4], vec![(PERSON, 0.9)])]));
        let out = p.process(Some(&Frame::blank(64, 48)), 0.3).unwrap();
        assert!(out.detections.is_empty());
        assert!(out.counters.is_empty());
        assert!(notifier.calls().is_empty());
        assert!(out.frame.data().iter().all(|&v| v == 0));
        assert_eq!((out.frame.width(), out.frame.height()), (640, 480));
    }

    #[test]
    fn test_watched_person_is_drawn() {
        let (mut p, _, _) = pipeline(tensor(80, &[([0.5, 0.5, 0.4, 0.4], vec![(PERSON, 0.9)])]));
        p.settings().replace(watching("person", ObjectActions::default()));
        let out = p.process(Some(&Frame::blank(64, 48)), 0.3).unwrap();
        assert_eq!(out.detections.len(), 1);
        // 未开启计数
        assert!(out.counters.is_empty());
        assert_eq!(out.frame.order(), ChannelOrder::Rgb);
        assert!(out.frame.data().iter().any(|&v| v != 0));
    }

    #[test]
    fn test_two_cars_notify_twice() {
        let (mut p, notifier, recorder) = pipeline(two_cars());
        let watch = watching("car", all_actions());
        let out = p.process_with(Some(&Frame::blank(64, 48)), 0.3, &watch).unwrap();
        assert_eq!(
            notifier.calls(),
            vec![
                ("car".to_string(), "user@example.com".to_string()),
                ("car".to_string(), "user@example.com".to_string()),
            ]
        );
        assert_eq!(recorder.calls(), vec!["car", "car"]);
        assert_eq!(out.counters.get("car"), 2);
    }

    #[test]
    fn test_slow_notification_does_not_block_frame() {
        let sender = SlowSender::new(Duration::from_millis(400));
        let detector = Detector::new(ScriptedEngine::new(two_cars()), YOLOv10Postprocessor::default());
        let mut p = FramePipeline::new(detector, SharedWatchConfig::default())
            .with_notifier(Box::new(HttpEmailNotifier::spawn(sender.clone()).unwrap()));
        let watch = watching("car", all_actions());

        let t = Instant::now();
        let out = p.process_with(Some(&Frame::blank(64, 48)), 0.3, &watch).unwrap();
        assert!(t.elapsed() < Duration::from_millis(400));
        assert_eq!(out.counters.get("car"), 2);

        // 流水线释放后, 已入队的通知全部投递
        drop(p);
        assert_eq!(sender.sent().len(), 2);
    }

    #[test]
    fn test_per_class_per_frame_policy() {
        let (p, notifier, recorder) = pipeline(two_cars());
        let mut p = p.with_notify_policy(NotifyPolicy::PerClassPerFrame);
        let watch = watching("car", all_actions());
        let frame = Frame::blank(64, 48);
        p.process_with(Some(&frame), 0.3, &watch).unwrap();
        assert_eq!(notifier.calls().len(), 1);
        // 录像触发不受通知策略影响
        assert_eq!(recorder.calls().len(), 2);
        // 下一帧重新计算
        p.process_with(Some(&frame), 0.3, &watch).unwrap();
        assert_eq!(notifier.calls().len(), 2);
    }

    #[test]
    fn test_absent_frame_is_blank() {
        let (mut p, notifier, _) = pipeline(two_cars());
        let out = p.process(None, 0.3).unwrap();
        assert_eq!(out.frame, Frame::blank(640, 480));
        assert!(out.counters.is_empty());
        assert!(notifier.calls().is_empty());
        assert!(p.detector().engine().last_input.is_none());
    }

    #[test]
    fn test_counters_follow_first_seen_order_and_reset() {
        let t = tensor(
            80,
            &[
                ([0.2, 0.5, 0.1, 0.1], vec![(CAR, 0.8)]),
                ([0.5, 0.5, 0.1, 0.1], vec![(PERSON, 0.8)]),
                ([0.8, 0.5, 0.1, 0.1], vec![(CAR, 0.8)]),
            ],
        );
        let (mut p, _, _) = pipeline(t);
        let counting = ObjectActions {
            count: true,
            ..Default::default()
        };
        let mut watch = watching("car", counting);
        watch.watch("person", true).set_actions("person", counting);

        let frame = Frame::blank(64, 48);
        for _ in 0..2 {
            let out = p.process_with(Some(&frame), 0.3, &watch).unwrap();
            let v: Vec<_> = out.counters.iter().collect();
            assert_eq!(v, vec![("car", 2), ("person", 1)]);
        }
    }

    #[test]
    fn test_out_of_range_class_id() {
        let t = tensor(90, &[([0.5, 0.5, 0.1, 0.1], vec![(85, 0.9)])]);
        let (mut p, _, _) = pipeline(t);
        assert!(matches!(
            p.process(Some(&Frame::blank(64, 48)), 0.3),
            Err(WatchError::UnknownClass { id: 85, len: 80 })
        ));
    }

    #[test]
    fn test_fallback_to_last_good_frame() {
        let (mut p, _, _) = pipeline(tensor(80, &[([0.5, 0.5, 0.4, 0.4], vec![(PERSON, 0.9)])]));
        p.settings().replace(watching("person", ObjectActions::default()));
        p.detector_mut().engine_mut().fail = true;

        let frame = Frame::blank(64, 48);
        let first = p.process_or_fallback(Some(&frame), 0.3);
        assert_eq!(first.frame, Frame::blank(640, 480));

        p.detector_mut().engine_mut().fail = false;
        let good = p.process_or_fallback(Some(&frame), 0.3);
        assert_eq!(good.detections.len(), 1);

        p.detector_mut().engine_mut().fail = true;
        let degraded = p.process_or_fallback(Some(&frame), 0.3);
        assert_eq!(degraded.frame, good.frame);
        assert!(degraded.detections.is_empty());
    }

    #[test]
    fn test_custom_display_size() {
        let (p, _, _) = pipeline(two_cars());
        let mut p = p.with_display_size(320, 240);
        assert_eq!(p.process(None, 0.3).unwrap().frame.width(), 320);
        let out = p.process(Some(&Frame::blank(64, 48)), 0.3).unwrap();
        assert_eq!((out.frame.width(), out.frame.height()), (320, 240));
    }
}
