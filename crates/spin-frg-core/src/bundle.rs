//! Four-channel value buffers for susceptibility data.
//!
//! A [`ChannelBundle`] holds one equally sized `f32` buffer per correlation
//! channel (three spin components plus the scalar density channel). All four
//! channels are always computed together because they share the same
//! integration cost, so the bundle is the unit in which the susceptibility
//! kernel produces and combines data.

use serde::{Deserialize, Serialize};

use crate::quadrature::Accumulate;

/// Correlation channel tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Spin-spin correlation along x.
    X,
    /// Spin-spin correlation along y.
    Y,
    /// Spin-spin correlation along z.
    Z,
    /// Scalar density-density correlation.
    Density,
}

impl Channel {
    /// All channels in storage order.
    pub const ALL: [Channel; 4] = [Channel::X, Channel::Y, Channel::Z, Channel::Density];

    /// Storage index of the channel.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Channel::X => 0,
            Channel::Y => 1,
            Channel::Z => 2,
            Channel::Density => 3,
        }
    }
}

/// Collection of four equally sized `f32` buffers, one per [`Channel`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBundle {
    channels: [Vec<f32>; 4],
}

impl ChannelBundle {
    /// Allocate a zero-initialized bundle with `len` entries per channel.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            channels: std::array::from_fn(|_| vec![0.0; len]),
        }
    }

    /// Number of entries per channel.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    /// Whether the per-channel buffers are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels[0].is_empty()
    }

    /// Read-only view of one channel's buffer.
    #[must_use]
    pub fn channel(&self, channel: Channel) -> &[f32] {
        &self.channels[channel.index()]
    }

    /// Mutable view of one channel's buffer.
    pub fn channel_mut(&mut self, channel: Channel) -> &mut [f32] {
        &mut self.channels[channel.index()]
    }

    /// Fused multiply-subtract on one channel: `self[ch] -= factor * rhs[ch]`.
    pub fn mult_sub_channel(&mut self, channel: Channel, factor: f32, rhs: &ChannelBundle) {
        let lhs = &mut self.channels[channel.index()];
        let src = &rhs.channels[channel.index()];
        for (l, r) in lhs.iter_mut().zip(src) {
            *l -= factor * r;
        }
    }
}

impl Accumulate for ChannelBundle {
    fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }

    fn mult_add(&mut self, weight: f32, rhs: &Self) {
        for (lhs, src) in self.channels.iter_mut().zip(&rhs.channels) {
            for (l, r) in lhs.iter_mut().zip(src) {
                *l += weight * r;
            }
        }
    }

    fn add(&mut self, rhs: &Self) {
        for (lhs, src) in self.channels.iter_mut().zip(&rhs.channels) {
            for (l, r) in lhs.iter_mut().zip(src) {
                *l += r;
            }
        }
    }

    fn scale(&mut self, factor: f32) {
        for channel in &mut self.channels {
            for value in channel.iter_mut() {
                *value *= factor;
            }
        }
    }
}
