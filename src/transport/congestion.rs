//! The two loss-recovery regimes a sender can run: a fixed-size window with
//! an optional fast-retransmit trigger, and full AIMD congestion control
//! (Slow Start / Congestion Avoidance / Fast Recovery).
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CongestionState {
    SlowStart,
    CongestionAvoidance,
    FastRecovery,
}

/// The outcome of observing a duplicate ACK, after the duplicate-ACK count
/// has reached the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DupAckOutcome {
    pub retransmit_earliest: bool,
    /// Whether the caller should reset its duplicate-ACK counter. The two
    /// regimes differ here: the fixed-window sender resets after any
    /// triggered fast retransmit, while the AIMD sender resets the counter
    /// only on a brand new cumulative ACK, letting every duplicate ACK past
    /// the third continue inflating `cwnd` while in fast recovery.
    pub reset_counter: bool,
}

#[derive(Debug)]
pub enum Controller {
    Fixed(FixedWindowController),
    Aimd(AimdController),
}

impl Controller {
    /// How many segments the controller currently allows in flight: the
    /// fixed `WINDOW_SIZE` for the fixed-window controller, or
    /// `floor(cwnd / MSS)` for AIMD.
    pub fn window_bound(&self) -> usize {
        match self {
            Controller::Fixed(c) => c.window_size,
            Controller::Aimd(c) => (c.cwnd / c.mss) as usize,
        }
    }

    pub fn on_new_ack(&mut self) {
        match self {
            Controller::Fixed(_) => {}
            Controller::Aimd(c) => c.on_new_ack(),
        }
    }

    pub fn on_dup_ack_threshold(&mut self) -> DupAckOutcome {
        match self {
            Controller::Fixed(c) => c.on_dup_ack_threshold(),
            Controller::Aimd(c) => c.on_dup_ack_threshold(),
        }
    }

    pub fn on_timeout(&mut self) {
        match self {
            Controller::Fixed(_) => {}
            Controller::Aimd(c) => c.on_timeout(),
        }
    }

    pub fn state(&self) -> Option<CongestionState> {
        match self {
            Controller::Fixed(_) => None,
            Controller::Aimd(c) => Some(c.state),
        }
    }
}

/// Fixed-size window, §WINDOW_SIZE packets in flight, with duplicate ACKs
/// either ignored entirely or driving a fast retransmit.
#[derive(Debug)]
pub struct FixedWindowController {
    window_size: usize,
    pub enable_fast_recovery: bool,
}

impl FixedWindowController {
    pub fn new(config: &Config, enable_fast_recovery: bool) -> Self {
        FixedWindowController {
            window_size: config.window_size,
            enable_fast_recovery,
        }
    }

    fn on_dup_ack_threshold(&mut self) -> DupAckOutcome {
        if self.enable_fast_recovery {
            DupAckOutcome {
                retransmit_earliest: true,
                reset_counter: true,
            }
        } else {
            DupAckOutcome {
                retransmit_earliest: false,
                reset_counter: false,
            }
        }
    }
}

/// AIMD congestion control emulating TCP Tahoe/Reno.
#[derive(Debug)]
pub struct AimdController {
    mss: u32,
    cwnd: u32,
    ssthresh: u32,
    state: CongestionState,
}

impl AimdController {
    pub fn new(config: &Config) -> Self {
        AimdController {
            mss: config.mss as u32,
            cwnd: config.initial_cwnd,
            ssthresh: config.initial_ssthresh,
            state: CongestionState::SlowStart,
        }
    }

    pub fn cwnd(&self) -> u32 {
        self.cwnd
    }

    pub fn ssthresh(&self) -> u32 {
        self.ssthresh
    }

    pub fn state(&self) -> CongestionState {
        self.state
    }

    fn on_new_ack(&mut self) {
        match self.state {
            CongestionState::SlowStart => {
                self.cwnd += self.mss;
                if self.cwnd >= self.ssthresh {
                    self.state = CongestionState::CongestionAvoidance;
                }
            }
            CongestionState::CongestionAvoidance => {
                let increment = ((self.mss as u64 * self.mss as u64) / self.cwnd as u64).max(1);
                self.cwnd += increment as u32;
            }
            CongestionState::FastRecovery => {
                self.cwnd = self.ssthresh;
                self.state = CongestionState::CongestionAvoidance;
            }
        }
    }

    fn on_dup_ack_threshold(&mut self) -> DupAckOutcome {
        match self.state {
            CongestionState::SlowStart | CongestionState::CongestionAvoidance => {
                self.ssthresh = (self.cwnd / 2).max(self.mss);
                self.cwnd = self.ssthresh + 3 * self.mss;
                self.state = CongestionState::FastRecovery;
                DupAckOutcome {
                    retransmit_earliest: true,
                    reset_counter: false,
                }
            }
            CongestionState::FastRecovery => {
                self.cwnd += self.mss;
                DupAckOutcome {
                    retransmit_earliest: false,
                    reset_counter: false,
                }
            }
        }
    }

    fn on_timeout(&mut self) {
        self.ssthresh = (self.cwnd / 2).max(self.mss);
        self.cwnd = self.mss;
        self.state = CongestionState::SlowStart;
    }
}
