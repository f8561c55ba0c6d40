use std::collections::VecDeque;
use std::fmt::Debug;

use tracing::{trace, warn};

use crate::error::{TbError, TbResult};
use crate::shared::TbObj;
use crate::signal::SimObject;
use crate::trigger::Trigger;

/// In-order comparison of expected against received items.
pub struct Scoreboard<T: PartialEq>(TbObj<ScoreboardInner<T>>);

impl<T: PartialEq> Clone for Scoreboard<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: PartialEq + Debug> Scoreboard<T> {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(TbObj::new(ScoreboardInner {
            exp_q: VecDeque::new(),
            recv_q: VecDeque::new(),
            errors: 0,
            expected: 0,
            received: 0,
            matched: 0,
        }))
    }

    pub fn add_exp(&self, data: T) {
        self.0.with_mut(|s| {
            s.exp_q.push_back(data);
            s.expected += 1;
        });
        self.compare();
    }

    pub fn add_recv(&self, data: T) {
        self.0.with_mut(|s| {
            s.recv_q.push_back(data);
            s.received += 1;
        });
        self.compare();
    }

    fn compare(&self) {
        self.0.with_mut(|s| {
            while let (Some(exp), Some(recv)) = (s.exp_q.front(), s.recv_q.front()) {
                if exp == recv {
                    s.matched += 1;
                } else {
                    warn!(expected = ?exp, received = ?recv, "scoreboard mismatch");
                    s.errors += 1;
                }
                s.exp_q.pop_front();
                s.recv_q.pop_front();
            }
        });
    }

    pub fn result(&self) -> TbResult<()> {
        match self.passed() {
            true => Ok(()),
            false => Err(TbError::Check(format!("scoreboard: {}", self.result_str()))),
        }
    }

    pub fn passed(&self) -> bool {
        let inner = self.0.get();
        inner.expected > 0
            && inner.received == inner.expected
            && inner.matched == inner.received
            && inner.errors == 0
            && inner.exp_q.is_empty()
            && inner.recv_q.is_empty()
    }

    pub fn matched(&self) -> u32 {
        self.0.get().matched
    }

    pub fn received(&self) -> u32 {
        self.0.get().received
    }

    pub fn errors(&self) -> u32 {
        self.0.get().errors
    }

    pub fn result_str(&self) -> String {
        let inner = self.0.get();
        format!(
            "expected={}, received={}, matched={}, errors={}, expQ: {}, recvQ: {}",
            inner.expected,
            inner.received,
            inner.matched,
            inner.errors,
            inner.exp_q.len(),
            inner.recv_q.len()
        )
    }
}

struct ScoreboardInner<T>
where
    T: PartialEq,
{
    exp_q: VecDeque<T>,
    recv_q: VecDeque<T>,
    errors: u32,
    expected: u32,
    received: u32,
    matched: u32,
}

/*
 * MONITOR
 */
/// Forwards observed items to one side of a scoreboard.
pub struct Monitor<T: PartialEq>(TbObj<MonitorInner<T>>);

impl<T: PartialEq> Clone for Monitor<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: PartialEq + Debug> Monitor<T> {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(TbObj::new(MonitorInner {
            enable: true,
            exp_not_recv: true,
            scoreboard: None,
        }))
    }

    pub fn set_scoreboard(&self, sb: Scoreboard<T>, exp_not_recv: bool) {
        self.0.with_mut(|m| {
            m.exp_not_recv = exp_not_recv;
            m.scoreboard = Some(sb);
        })
    }

    pub fn set_enable(&self, enable: bool) {
        self.0.with_mut(|m| m.enable = enable)
    }

    pub fn to_scoreboard(&self, data: T) -> TbResult<()> {
        let (sb, exp_not_recv) = {
            let m = self.0.get();
            if !m.enable {
                return Ok(());
            }
            let sb = m.scoreboard.clone().ok_or_else(|| {
                TbError::Check("can't forward data to scoreboard, no scoreboard set".to_string())
            })?;
            (sb, m.exp_not_recv)
        };
        match exp_not_recv {
            true => sb.add_exp(data),
            false => sb.add_recv(data),
        }
        Ok(())
    }
}

struct MonitorInner<T: PartialEq> {
    enable: bool,
    exp_not_recv: bool,
    scoreboard: Option<Scoreboard<T>>,
}

/*
 * CLOCK
 */
/// Drives `clk` forever with the given period; fork it.
pub async fn clock(clk: SimObject, period: u64, unit: &str) -> TbResult<()> {
    let high_t = period / 2;
    let low_t = period - high_t;
    if period % 2 != 0 {
        warn!(
            "Clock period {period}{unit} not dividable by 2. High time will be {high_t}{unit}; low time will be {low_t}{unit}."
        );
    }
    trace!(clk = %clk.name(), period, unit, "clock started");
    loop {
        clk.set(0)?;
        Trigger::timer(low_t, unit).await?;
        clk.set(1)?;
        Trigger::timer(high_t, unit).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoreboard_matches_in_order() {
        let sb = Scoreboard::new();
        sb.add_exp(0xAu8);
        sb.add_exp(0x5);
        sb.add_recv(0xA);
        assert!(!sb.passed());
        sb.add_recv(0x5);
        assert!(sb.passed());
        assert_eq!(sb.matched(), 2);
    }

    #[test]
    fn scoreboard_counts_mismatches() {
        let sb = Scoreboard::new();
        sb.add_exp(1u8);
        sb.add_recv(2);
        assert_eq!(sb.errors(), 1);
        assert!(matches!(sb.result(), Err(TbError::Check(_))));
    }

    #[test]
    fn empty_scoreboard_does_not_pass() {
        assert!(!Scoreboard::<u8>::new().passed());
    }

    #[test]
    fn monitor_feeds_its_side() {
        let sb = Scoreboard::new();
        let exp = Monitor::new();
        let recv = Monitor::new();
        exp.set_scoreboard(sb.clone(), true);
        recv.set_scoreboard(sb.clone(), false);
        exp.to_scoreboard(7u8).unwrap();
        recv.to_scoreboard(7u8).unwrap();
        assert!(sb.passed());
    }

    #[test]
    fn monitor_without_scoreboard_fails() {
        assert!(Monitor::<u8>::new().to_scoreboard(1).is_err());
    }
}
