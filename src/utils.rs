use rand as rnd;

use crate::error::TbResult;
use crate::signal::SimObject;

/// Waits for `n_cycles` rising edges of `signal`.
pub async fn clock_cycles(signal: SimObject, n_cycles: u32) -> TbResult<()> {
    for _ in 0..n_cycles {
        signal.rising_edge().await?;
    }
    Ok(())
}

#[inline]
pub fn rand() -> f32 {
    rnd::random::<f32>()
}

#[inline]
pub fn rand_int(ceil: u32) -> u32 {
    rnd::random::<u32>() % ceil
}

/// Random 4-bit data word.
#[inline]
pub fn rand_nibble() -> u8 {
    rand_int(16) as u8
}
