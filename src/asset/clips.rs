//! Animation clip document parsing
//!
//! Clips travel separately from models and are keyed by bone name, so a
//! clip cached once can drive any avatar whose skeleton shares those
//! names. Translations and rotations are required per track; scales
//! default to one.

use glam::{Quat, Vec3};
use serde::Deserialize;

use crate::animation::{AnimationClip, BoneTrack, TransformKeyframe};
use crate::core::error::Error;
use crate::core::types::Result;

#[derive(Debug, Deserialize)]
struct ClipDocument {
    name: String,
    #[serde(default)]
    looping: bool,
    tracks: Vec<TrackDoc>,
}

#[derive(Debug, Deserialize)]
struct TrackDoc {
    bone: String,
    times: Vec<f32>,
    translations: Vec<[f32; 3]>,
    rotations: Vec<[f32; 4]>,
    #[serde(default)]
    scales: Vec<[f32; 3]>,
}

/// Parse a clip document into a runtime `AnimationClip`.
///
/// Every channel of a track must have one value per keyframe time;
/// mismatches and empty tracks are `Error::Decode`. The clip duration is
/// computed from the tracks, not trusted from the document.
pub fn parse_clip(bytes: &[u8]) -> Result<AnimationClip> {
    let doc: ClipDocument = serde_json::from_slice(bytes)
        .map_err(|e| Error::Decode(format!("clip document: {}", e)))?;

    let mut clip = AnimationClip::new(doc.name);
    clip.looping = doc.looping;

    for track_doc in &doc.tracks {
        clip.add_track(build_track(track_doc)?);
    }

    clip.calculate_duration();
    Ok(clip)
}

fn build_track(doc: &TrackDoc) -> Result<BoneTrack> {
    let key_count = doc.times.len();
    if key_count == 0 {
        return Err(Error::Decode(format!("track {:?}: no keyframes", doc.bone)));
    }

    for (channel, len) in [
        ("translations", doc.translations.len()),
        ("rotations", doc.rotations.len()),
    ] {
        if len != key_count {
            return Err(Error::Decode(format!(
                "track {:?}: {} {} values for {} times",
                doc.bone, len, channel, key_count
            )));
        }
    }
    if !doc.scales.is_empty() && doc.scales.len() != key_count {
        return Err(Error::Decode(format!(
            "track {:?}: {} scale values for {} times",
            doc.bone,
            doc.scales.len(),
            key_count
        )));
    }

    let mut track = BoneTrack::new(doc.bone.clone());
    for i in 0..key_count {
        let scale = doc
            .scales
            .get(i)
            .map(|s| Vec3::from_array(*s))
            .unwrap_or(Vec3::ONE);
        track.add_keyframe(TransformKeyframe::new(
            doc.times[i],
            Vec3::from_array(doc.translations[i]),
            Quat::from_array(doc.rotations[i]),
            scale,
        ));
    }
    Ok(track)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::SkeletonBuilder;
    use glam::Mat4;
    use serde_json::json;

    fn sway_document() -> serde_json::Value {
        json!({
            "name": "sway",
            "looping": true,
            "tracks": [
                {
                    "bone": "hips",
                    "times": [0.0, 1.0],
                    "translations": [[0.0, 0.0, 0.0], [0.2, 0.0, 0.0]],
                    "rotations": [[0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.0, 1.0]]
                },
                {
                    "bone": "spine",
                    "times": [0.0, 2.0],
                    "translations": [[0.0, 1.0, 0.0], [0.0, 1.1, 0.0]],
                    "rotations": [[0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.0, 1.0]],
                    "scales": [[1.0, 1.0, 1.0], [1.0, 1.0, 1.0]]
                }
            ]
        })
    }

    fn parse(value: serde_json::Value) -> Result<AnimationClip> {
        parse_clip(&serde_json::to_vec(&value).unwrap())
    }

    #[test]
    fn test_parse_clip_document() {
        let clip = parse(sway_document()).unwrap();

        assert_eq!(clip.name, "sway");
        assert!(clip.looping);
        assert_eq!(clip.tracks.len(), 2);
        assert_eq!(clip.duration, 2.0);
        assert!(clip.track_for("hips").is_some());
    }

    #[test]
    fn test_parsed_clip_samples_against_a_skeleton() {
        let clip = parse(sway_document()).unwrap();
        let skeleton = SkeletonBuilder::new()
            .add_root("hips", Mat4::IDENTITY)
            .add_bone("spine", "hips", Mat4::from_translation(glam::Vec3::new(0.0, 1.0, 0.0)))
            .build()
            .unwrap();

        let transforms = clip.sample(1.0, &skeleton);
        let hips = transforms[0].to_scale_rotation_translation().2;
        assert!((hips.x - 0.2).abs() < 0.001);
    }

    #[test]
    fn test_channel_length_mismatch_rejected() {
        let mut doc = sway_document();
        doc["tracks"][0]["translations"] = json!([[0.0, 0.0, 0.0]]);

        let err = parse(doc).unwrap_err();
        assert!(err.to_string().contains("1 translations values for 2 times"));
    }

    #[test]
    fn test_scale_length_mismatch_rejected() {
        let mut doc = sway_document();
        doc["tracks"][1]["scales"] = json!([[1.0, 1.0, 1.0]]);

        let err = parse(doc).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_empty_track_rejected() {
        let mut doc = sway_document();
        doc["tracks"][0]["times"] = json!([]);
        doc["tracks"][0]["translations"] = json!([]);
        doc["tracks"][0]["rotations"] = json!([]);

        let err = parse(doc).unwrap_err();
        assert!(err.to_string().contains("no keyframes"));
    }

    #[test]
    fn test_not_json_rejected() {
        assert!(matches!(parse_clip(b"nope").unwrap_err(), Error::Decode(_)));
    }
}
