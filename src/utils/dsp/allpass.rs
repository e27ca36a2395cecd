//! Schroeder all-pass stages and cascaded diffuser chains.

use super::delay::DelayLine;

// -------------------------------------------------------------------------------------------------

/// Single all-pass delay stage with a fixed delay length.
#[derive(Debug, Clone)]
pub struct AllpassStage {
    delay: DelayLine,
    delay_frames: usize,
}

impl AllpassStage {
    pub fn new(delay_frames: usize) -> Self {
        let delay_frames = delay_frames.max(1);
        Self {
            delay: DelayLine::new(delay_frames),
            delay_frames,
        }
    }

    pub fn delay_frames(&self) -> usize {
        self.delay_frames
    }

    pub fn flush(&mut self) {
        self.delay.flush();
    }

    /// `delayed = read(); ff = input - delayed * fb; write(ff); out = delayed + ff * fb`
    #[inline]
    pub fn process_sample(&mut self, input: f32, feedback: f32) -> f32 {
        let delayed = self.delay.read_frames(self.delay_frames);
        let feedforward = input - delayed * feedback;
        self.delay.write(feedforward);
        delayed + feedforward * feedback
    }
}

// -------------------------------------------------------------------------------------------------

/// Ordered cascade of all-pass stages sharing one feedback coefficient.
///
/// All stages are allocated up front. The number of *active* stages can be lowered at
/// runtime to save CPU without reallocating.
#[derive(Debug, Clone)]
pub struct DiffuserChain {
    stages: Vec<AllpassStage>,
    active_stages: usize,
    feedback: f32,
}

impl DiffuserChain {
    /// Max feedback coefficient: keeps every stage well inside the stable range.
    pub const MAX_FEEDBACK: f32 = 0.9;

    /// Create a new chain with the given stage lengths in frames.
    pub fn new(stage_frames: &[usize], feedback: f32) -> Self {
        let stages = stage_frames
            .iter()
            .map(|frames| AllpassStage::new(*frames))
            .collect::<Vec<_>>();
        let active_stages = stages.len();
        Self {
            stages,
            active_stages,
            feedback: feedback.clamp(0.0, Self::MAX_FEEDBACK),
        }
    }

    /// Create a new chain from stage lengths in milliseconds, scaled to the sample rate.
    pub fn from_ms(sample_rate: u32, stage_ms: &[f32], feedback: f32) -> Self {
        let frames = stage_ms
            .iter()
            .map(|ms| (ms * sample_rate as f32 / 1000.0).round().max(1.0) as usize)
            .collect::<Vec<_>>();
        Self::new(&frames, feedback)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn active_stages(&self) -> usize {
        self.active_stages
    }

    /// Limit processing to the first `count` stages.
    pub fn set_active_stages(&mut self, count: usize) {
        self.active_stages = count.min(self.stages.len());
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, Self::MAX_FEEDBACK);
    }

    pub fn flush(&mut self) {
        for stage in &mut self.stages {
            stage.flush();
        }
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        let feedback = self.feedback;
        self.stages[..self.active_stages]
            .iter_mut()
            .fold(input, |sample, stage| stage.process_sample(sample, feedback))
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allpass_preserves_energy() {
        let mut chain = DiffuserChain::new(&[13, 29, 41, 53], 0.6);
        let mut energy = 0.0;
        for i in 0..20_000 {
            let input = if i == 0 { 1.0 } else { 0.0 };
            let output = chain.process_sample(input);
            energy += output * output;
        }
        // an all-pass cascade neither adds nor removes energy from an impulse
        assert!((energy - 1.0).abs() < 1e-3, "energy: {energy}");
    }

    #[test]
    fn active_stage_count() {
        let mut chain = DiffuserChain::from_ms(48000, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 0.5);
        assert_eq!(chain.stage_count(), 6);
        chain.set_active_stages(10);
        assert_eq!(chain.active_stages(), 6);
        chain.set_active_stages(0);
        assert_eq!(chain.process_sample(0.25), 0.25);
        chain.set_feedback(2.0);
        assert_eq!(chain.feedback(), DiffuserChain::MAX_FEEDBACK);
    }
}
