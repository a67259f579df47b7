use crate::analysis::fft::SpectrumPlan;

/// Number of frames a centered STFT produces for `len` samples.
pub(super) fn frame_count(len: usize, hop: usize) -> usize {
    1 + len / hop.max(1)
}

/// Run a centered STFT (zero padding of half a frame on both sides) and hand
/// each frame's power spectrum to `visit`.
pub(super) fn for_each_power_frame(
    samples: &[f32],
    hop: usize,
    plan: &mut SpectrumPlan,
    mut visit: impl FnMut(&[f32]),
) {
    let frame_len = plan.len();
    let pad = frame_len / 2;
    let hop = hop.max(1);
    let mut frame = vec![0.0_f32; frame_len];
    let mut power = Vec::with_capacity(plan.bins());
    for index in 0..frame_count(samples.len(), hop) {
        let start = (index * hop) as isize - pad as isize;
        fill_frame(&mut frame, samples, start);
        plan.power_into(&frame, &mut power);
        visit(&power);
    }
}

fn fill_frame(frame: &mut [f32], samples: &[f32], start: isize) {
    for (i, cell) in frame.iter_mut().enumerate() {
        let pos = start + i as isize;
        *cell = if pos < 0 {
            0.0
        } else {
            samples.get(pos as usize).copied().unwrap_or(0.0)
        };
    }
}
