//! Restored message set scheduled onto a QN8027 behind a fake register bus.

use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;
use qn8027::{Qn8027, RdsGroup, RegisterBus};
use rds_scheduler::{MessageSet, MessageSetConfig, RdsScheduler, Tick};

const STATUS: u8 = 0x07;
const RDSD0: u8 = 0x08;
const RDSD7: u8 = 0x0F;

/// Register file whose RDS sent bit flips on every STATUS read, so each
/// group is acknowledged on the first poll.
#[derive(Default)]
struct FakeBus {
    registers: [u8; 0x20],
    groups: Vec<RdsGroup>,
}

impl FakeBus {
    fn radio_text(&self) -> String {
        self.groups
            .iter()
            .filter(|group| group.block(1)[0] & 0xF0 == 0x20)
            .flat_map(|group| group.text().iter().copied())
            .take_while(|byte| *byte != 0)
            .map(char::from)
            .collect()
    }
}

impl RegisterBus for FakeBus {
    async fn read_register(&mut self, reg: u8) -> Result<u8, qn8027::Error> {
        if reg == STATUS {
            self.registers[STATUS as usize] ^= 0x08;
        }
        Ok(self.registers[reg as usize])
    }

    async fn write_register(&mut self, reg: u8, value: u8) -> Result<(), qn8027::Error> {
        self.registers[reg as usize] = value;
        if reg == RDSD7 {
            let mut group = [0u8; 8];
            group.copy_from_slice(&self.registers[RDSD0 as usize..=RDSD7 as usize]);
            self.groups.push(RdsGroup(group));
        }
        Ok(())
    }
}

struct NoDelay;

impl DelayNs for NoDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

fn restored_set(json: &str) -> MessageSet<NoopRawMutex> {
    let config: MessageSetConfig = serde_json::from_str(json).unwrap();
    let set = MessageSet::new();
    set.try_lock().unwrap().restore(&config);
    set
}

#[test]
fn restored_messages_reach_the_transmitter() {
    let set = restored_set(
        r#"{
            "name": "Local",
            "list": [
                { "message": "Hello World!", "durationSec": 5, "enabled": true },
                { "message": "Off air", "enabled": false }
            ]
        }"#,
    );
    let mut radio = Qn8027::new(FakeBus::default(), NoDelay);
    radio.set_pi_code(0x6400);
    radio.set_pty_code(19).unwrap();
    let mut scheduler = RdsScheduler::new("KZAP");

    let tick = block_on(scheduler.poll(Instant::from_millis(0), &set, &mut radio));
    assert_eq!(tick, Tick::Sent);

    let (bus, _) = radio.release();
    // Station name: "KZ", "AP", terminator.
    assert_eq!(bus.groups.len(), 3 + 4);
    assert_eq!(bus.groups[0].block(0), [0x64, 0x00]);
    assert_eq!(bus.groups[3].block(1), [0x22, 0x60]);
    assert_eq!(bus.radio_text(), "Hello World!");
}

#[test]
fn unchanged_text_causes_no_bus_traffic() {
    let set = restored_set(r#"{ "list": [ { "message": "Only one", "durationSec": 5 } ] }"#);
    let mut radio = Qn8027::new(FakeBus::default(), NoDelay);
    let mut scheduler = RdsScheduler::new("PixelFM");

    for second in 0..12 {
        block_on(scheduler.poll(Instant::from_secs(second), &set, &mut radio));
    }
    let (bus, _) = radio.release();
    // One station name (4 groups for 7 chars + terminator) and one radio
    // text (3 groups for 8 chars + terminator).
    assert_eq!(bus.groups.len(), 4 + 3);
}
