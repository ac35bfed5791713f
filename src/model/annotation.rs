//! Landmark annotations
//!
//! Types produced by the detection services and persisted per session.
//! The serialized layout is the dataset format consumed by training:
//! `{"hands": [...], "pose": {...} | null}` per frame.

use serde::{Deserialize, Serialize};

/// A single 3D landmark, serialized as `[x, y, z]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark(pub f32, pub f32, pub f32);

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(x, y, z)
    }

    pub fn x(&self) -> f32 {
        self.0
    }

    pub fn y(&self) -> f32 {
        self.1
    }

    pub fn z(&self) -> f32 {
        self.2
    }
}

/// Which hand a detection belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

/// One detected hand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandDetection {
    pub handedness: Handedness,

    /// Landmarks in normalized image coordinates
    pub hand_landmarks: Vec<Landmark>,

    /// Landmarks in metric world coordinates
    pub hand_world_landmarks: Vec<Landmark>,
}

/// Detected body pose
///
/// Absence of a pose is `None` at the annotation level; a present
/// `PoseDetection` always comes from an actual detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseDetection {
    pub pose_landmarks: Vec<Landmark>,
    pub pose_world_landmarks: Vec<Landmark>,
}

/// Paired hand and pose result for one frame
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CombinedAnnotation {
    pub hands: Vec<HandDetection>,

    /// `null` when no pose was detected
    pub pose: Option<PoseDetection>,
}

impl CombinedAnnotation {
    pub fn new(hands: Vec<HandDetection>, pose: Option<PoseDetection>) -> Self {
        Self { hands, pose }
    }

    /// True when neither hands nor a pose were detected
    pub fn is_empty(&self) -> bool {
        self.hands.is_empty() && self.pose.is_none()
    }
}

/// Ordered annotations of one session, in frame processing order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionDataset {
    records: Vec<CombinedAnnotation>,
}

impl SessionDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, annotation: CombinedAnnotation) {
        self.records.push(annotation);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CombinedAnnotation] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_hand() -> HandDetection {
        HandDetection {
            handedness: Handedness::Right,
            hand_landmarks: vec![Landmark::new(0.5, 0.25, -0.125)],
            hand_world_landmarks: vec![Landmark::new(0.0625, 1.5, -2.0)],
        }
    }

    #[test]
    fn absent_pose_serializes_as_null() {
        let annotation = CombinedAnnotation::default();
        let value = serde_json::to_value(&annotation).unwrap();
        assert_eq!(value, json!({"hands": [], "pose": null}));
    }

    #[test]
    fn null_pose_reads_back_as_not_detected() {
        let annotation: CombinedAnnotation =
            serde_json::from_str(r#"{"hands": [], "pose": null}"#).unwrap();
        assert!(annotation.pose.is_none());
        assert!(annotation.is_empty());
    }

    #[test]
    fn empty_pose_lists_stay_present() {
        let annotation: CombinedAnnotation = serde_json::from_str(
            r#"{"hands": [], "pose": {"pose_landmarks": [], "pose_world_landmarks": []}}"#,
        )
        .unwrap();
        assert_eq!(
            annotation.pose,
            Some(PoseDetection {
                pose_landmarks: vec![],
                pose_world_landmarks: vec![],
            })
        );
    }

    #[test]
    fn hand_layout_matches_dataset_format() {
        let annotation = CombinedAnnotation::new(vec![sample_hand()], None);
        let value = serde_json::to_value(&annotation).unwrap();
        assert_eq!(
            value["hands"][0],
            json!({
                "handedness": "Right",
                "hand_landmarks": [[0.5, 0.25, -0.125]],
                "hand_world_landmarks": [[0.0625, 1.5, -2.0]],
            })
        );
    }

    #[test]
    fn dataset_serializes_as_plain_list() {
        let mut dataset = SessionDataset::new();
        dataset.push(CombinedAnnotation::default());
        dataset.push(CombinedAnnotation::new(vec![sample_hand()], None));
        let text = serde_json::to_string(&dataset).unwrap();
        assert!(text.starts_with('['));

        let back: SessionDataset = serde_json::from_str(&text).unwrap();
        assert_eq!(back, dataset);
    }
}
