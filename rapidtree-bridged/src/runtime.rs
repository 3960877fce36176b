//! Daemon event loop
//!
//! Owns one engine, its learning table and a link driver. The loop sleeps
//! until the engine's earliest timer deadline or the next received frame,
//! delivers the event, then transmits whatever the engine queued on its
//! relay. Virtual engine time is monotonic elapsed time since startup.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use rapidtree_core::{LearningTable, Result, SimTime};
use rapidtree_engine::{Engine, EngineCtx, TimerKind};
use rapidtree_packet::{decode_bpdu_frame, encode_bpdu_frame, Bpdu};

use crate::driver::LinkDriver;

/// One bridge running over a link driver.
pub struct BridgeRuntime<D: LinkDriver> {
    engine: Engine,
    table: LearningTable,
    driver: D,
    outbox: Vec<(usize, Bpdu)>,
    epoch: Instant,
}

impl<D: LinkDriver> BridgeRuntime<D> {
    pub fn new(engine: Engine, driver: D) -> Self {
        Self {
            engine,
            table: LearningTable::new(),
            driver,
            outbox: Vec::new(),
            epoch: Instant::now(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    fn now(&self) -> SimTime {
        SimTime::from_micros(self.epoch.elapsed().as_micros() as u64)
    }

    fn instant_of(&self, t: SimTime) -> Instant {
        self.epoch + Duration::from_micros(t.as_micros())
    }

    /// Start the engine and process events until the driver closes or the
    /// process is interrupted.
    pub async fn run(mut self) -> Result<()> {
        let now = self.now();
        {
            let mut ctx = EngineCtx {
                now,
                mac_table: &mut self.table,
                relay: &mut self.outbox,
            };
            self.engine.start(&mut ctx);
        }
        self.flush_outbox().await?;

        loop {
            let deadline = self.engine.next_deadline();
            let sleep = sleep_until(match deadline {
                Some((at, _)) => self.instant_of(at),
                // placeholder; the branch below is disabled in this case
                None => Instant::now() + Duration::from_secs(3600),
            });

            tokio::select! {
                _ = sleep, if deadline.is_some() => {
                    if let Some((_, kind)) = deadline {
                        self.fire_timer(kind);
                    }
                }
                received = self.driver.recv() => {
                    match received {
                        Some((port, data)) => self.handle_frame(port, &data),
                        None => {
                            info!("link driver closed, stopping");
                            self.engine.stop();
                            break;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted, stopping");
                    self.engine.stop();
                    break;
                }
            }

            self.flush_outbox().await?;
        }
        Ok(())
    }

    fn fire_timer(&mut self, kind: TimerKind) {
        let now = self.now();
        let mut ctx = EngineCtx {
            now,
            mac_table: &mut self.table,
            relay: &mut self.outbox,
        };
        self.engine.on_timer(kind, &mut ctx);
    }

    fn handle_frame(&mut self, port: usize, data: &[u8]) {
        match decode_bpdu_frame(data) {
            Ok(Some((src, bpdu))) => {
                let now = self.now();
                let mut ctx = EngineCtx {
                    now,
                    mac_table: &mut self.table,
                    relay: &mut self.outbox,
                };
                if let Err(e) = self.engine.on_bpdu(&bpdu, port, src, &mut ctx) {
                    warn!(port, error = %e, "BPDU rejected");
                }
            }
            // unrelated traffic on the interface
            Ok(None) => {}
            Err(e) => debug!(port, error = %e, "undecodable frame ignored"),
        }
    }

    async fn flush_outbox(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.outbox);
        let src = self.engine.address();
        for (port, bpdu) in pending {
            let frame = encode_bpdu_frame(src, &bpdu);
            self.driver.send(port, &frame).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::LoopbackDriver;
    use rapidtree_core::{BridgeConfig, MacAddr, StaticInterfaceTable};

    #[tokio::test(start_paused = true)]
    async fn test_started_bridge_emits_hello_within_one_period() {
        let mac = MacAddr([0, 0, 0, 0, 0, 7]);
        let engine = Engine::new(
            &BridgeConfig::default(),
            &StaticInterfaceTable::uniform(mac, 1, 19),
        )
        .unwrap();

        let (a, mut b) = LoopbackDriver::pair();
        tokio::spawn(BridgeRuntime::new(engine, a).run());

        let received = tokio::time::timeout(Duration::from_secs(2), b.recv())
            .await
            .expect("a hello BPDU within one hello period");
        let (port, data) = received.expect("driver closed early");
        assert_eq!(port, 0);

        let (src, bpdu) = decode_bpdu_frame(&data).unwrap().unwrap();
        assert_eq!(src, mac);
        // freshly started bridge claims itself as root, no TC pending
        assert_eq!(bpdu.root.mac, mac);
        assert_eq!(bpdu.root_path_cost, 0);
        assert!(!bpdu.tc);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_accepts_superior_root_from_peer() {
        let mac_low = MacAddr([0, 0, 0, 0, 0, 1]);
        let mac_high = MacAddr([0, 0, 0, 0, 0, 9]);
        let engine = Engine::new(
            &BridgeConfig::default(),
            &StaticInterfaceTable::uniform(mac_high, 1, 19),
        )
        .unwrap();

        let (a, mut b) = LoopbackDriver::pair();
        tokio::spawn(BridgeRuntime::new(engine, a).run());

        // drain the initial hello, then answer as the better bridge
        let _ = b.recv().await.expect("initial hello");
        let claim = Bpdu {
            root: rapidtree_core::BridgeId::new(32768, mac_low),
            root_path_cost: 0,
            bridge: rapidtree_core::BridgeId::new(32768, mac_low),
            port_priority: 128,
            port_num: 0,
            message_age: 0,
            max_age: 20,
            hello_time: 2,
            forward_delay: 15,
            tc: false,
            tca: false,
        };
        b.send(0, &encode_bpdu_frame(mac_low, &claim)).await.unwrap();

        // the engine answers the flood with a TC notification on its new
        // root port, carrying the superior root
        let deadline = Duration::from_secs(1);
        let (_, data) = tokio::time::timeout(deadline, b.recv())
            .await
            .expect("an expedited BPDU after the election")
            .expect("driver closed early");
        let (_, bpdu) = decode_bpdu_frame(&data).unwrap().unwrap();
        assert_eq!(bpdu.root.mac, mac_low);
        assert!(bpdu.tc);
    }
}
