//! Binary recording of body states over time.
//!
//! Layout, all little-endian:
//!
//! | field         | type                                   |
//! |---------------|----------------------------------------|
//! | `body_count`  | `u64`                                  |
//! | `frame_count` | `u64`                                  |
//! | payload       | `f64 [frame_count][body_count][4]`     |
//!
//! Each body contributes `[x, y, vx, vy]` to a frame.

use std::io::{self, Read, Write};

use crate::body::Body;
use crate::error::{Result, SimError};

/// Values stored per body per frame.
pub const VALUES_PER_BODY: usize = 4;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trajectory {
    body_count: usize,
    frames: Vec<f64>,
}

impl Trajectory {
    pub fn new(body_count: usize) -> Self {
        Self {
            body_count,
            frames: Vec::new(),
        }
    }

    pub fn body_count(&self) -> usize {
        self.body_count
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len().checked_div(self.frame_len()).unwrap_or(0)
    }

    fn frame_len(&self) -> usize {
        self.body_count * VALUES_PER_BODY
    }

    /// Appends the current state of `bodies` as a new frame.
    pub fn record(&mut self, bodies: &[Body]) -> Result<()> {
        if bodies.len() != self.body_count {
            return Err(SimError::Format(format!(
                "frame has {} bodies, trajectory holds {}",
                bodies.len(),
                self.body_count
            )));
        }
        self.frames.reserve(self.frame_len());
        for body in bodies {
            self.frames
                .extend_from_slice(&[body.pos.x, body.pos.y, body.vel.x, body.vel.y]);
        }
        Ok(())
    }

    /// Interleaved `[x, y, vx, vy]` values of one frame.
    pub fn frame(&self, index: usize) -> Option<&[f64]> {
        if index >= self.frame_count() {
            return None;
        }
        let len = self.frame_len();
        self.frames.get(index * len..(index + 1) * len)
    }

    pub fn frames(&self) -> impl Iterator<Item = &[f64]> {
        self.frames.chunks_exact(self.frame_len().max(1))
    }

    pub fn write_to(&self, mut writer: impl Write) -> Result<()> {
        writer.write_all(&(self.body_count as u64).to_le_bytes())?;
        writer.write_all(&(self.frame_count() as u64).to_le_bytes())?;
        if cfg!(target_endian = "little") {
            writer.write_all(bytemuck::cast_slice(&self.frames))?;
        } else {
            for value in &self.frames {
                writer.write_all(&value.to_le_bytes())?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_from(mut reader: impl Read) -> Result<Self> {
        let body_count = read_u64(&mut reader)?;
        let frame_count = read_u64(&mut reader)?;
        let payload_len = body_count
            .checked_mul(frame_count)
            .and_then(|n| n.checked_mul((VALUES_PER_BODY * size_of::<f64>()) as u64))
            .filter(|&n| usize::try_from(n).is_ok())
            .ok_or_else(|| {
                SimError::Format(format!(
                    "{frame_count} frames of {body_count} bodies does not fit in memory"
                ))
            })?;
        let body_count = usize::try_from(body_count)
            .map_err(|_| SimError::Format(format!("body count {body_count} is too large")))?;

        // The header is untrusted: the buffer grows with the bytes actually present.
        let mut payload = Vec::new();
        reader.take(payload_len).read_to_end(&mut payload)?;
        if (payload.len() as u64) < payload_len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("payload holds {} of {payload_len} bytes", payload.len()),
            )
            .into());
        }

        let frames = payload
            .chunks_exact(size_of::<f64>())
            .map(|bytes| f64::from_bits(u64::from_le(bytemuck::pod_read_unaligned(bytes))))
            .collect();

        Ok(Self { body_count, frames })
    }
}

fn read_u64(reader: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Trajectory {
        let mut bodies = vec![
            Body::from_components(0.1, 0.2, 0.3, 0.4, 1.0),
            Body::probe(-1.5, 2.5),
        ];
        let mut trajectory = Trajectory::new(2);
        trajectory.record(&bodies).unwrap();
        bodies[1].kill();
        trajectory.record(&bodies).unwrap();
        trajectory
    }

    #[test]
    fn header_and_payload_are_little_endian() {
        let mut bytes = Vec::new();
        sample().write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 16 + 2 * 2 * 4 * 8);
        assert_eq!(&bytes[0..8], &2u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &2u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &0.1f64.to_le_bytes());
    }

    #[test]
    fn reads_back_what_was_written() {
        let trajectory = sample();
        let mut bytes = Vec::new();
        trajectory.write_to(&mut bytes).unwrap();
        let loaded = Trajectory::read_from(bytes.as_slice()).unwrap();
        assert_eq!(loaded, trajectory);
        assert_eq!(loaded.frame(1).unwrap()[4..], [999.0, 999.0, 0.0, 0.0]);
        assert!(loaded.frame(2).is_none());
    }

    #[test]
    fn truncated_input_is_an_error() {
        let mut bytes = Vec::new();
        sample().write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(Trajectory::read_from(bytes.as_slice()), Err(SimError::Io(_))));
    }

    #[test]
    fn oversized_header_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(Trajectory::read_from(bytes.as_slice()), Err(SimError::Format(_))));
    }

    #[test]
    fn huge_header_without_payload_is_an_io_error() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(1u64 << 40).to_le_bytes());
        bytes.extend_from_slice(&1u64.to_le_bytes());
        let err = Trajectory::read_from(bytes.as_slice()).unwrap_err();
        match err {
            SimError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected an IO error, got {other:?}"),
        }
    }

    #[test]
    fn empty_trajectory_has_no_frames() {
        let mut trajectory = Trajectory::new(0);
        trajectory.record(&[]).unwrap();
        assert_eq!(trajectory.frame_count(), 0);
        assert!(trajectory.frame(0).is_none());
        assert!(trajectory.frame(5).is_none());
    }

    #[test]
    fn record_rejects_wrong_body_count() {
        let mut trajectory = Trajectory::new(3);
        assert!(trajectory.record(&[Body::default()]).is_err());
        assert_eq!(trajectory.frame_count(), 0);
    }
}
