//! ---
//! scs_section: "04-plc-safety-loop"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Reactor PLC safety loop, communications, and scheduler."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
//! End-to-end scenarios driving a full PLC node over a loopback radio with
//! the clock paused, so every cadence and timeout lands deterministically.

use std::time::Duration;

use r_scs_common::config::NodeConfig;
use r_scs_plc::iss::IssSample;
use r_scs_plc::peripherals::SimReactor;
use r_scs_plc::scheduler::Scheduler;
use r_scs_plc::SchedulerHandles;
use r_scs_wire::{
    loopback_pair, FieldValue, IssStatus, LinkResult, LoopbackRadio, MgmtPacket, RadioTransport,
    RplcPacket, RplcType, ScadaFrame,
};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at};

const PLC_PORT: u16 = 16001;
const SUPERVISOR_PORT: u16 = 16000;

struct Harness {
    device: SimReactor,
    handles: SchedulerHandles,
    supervisor: LoopbackRadio,
    task: JoinHandle<anyhow::Result<()>>,
    seq: u32,
}

fn node_config() -> NodeConfig {
    "reactor_id = 7".parse().expect("test config parses")
}

fn start_plc() -> Harness {
    let (plc_radio, supervisor) = loopback_pair(PLC_PORT, SUPERVISOR_PORT);
    let device = SimReactor::new();
    let (scheduler, handles) = Scheduler::new(
        &node_config(),
        Some(Box::new(device.handle())),
        Some(Box::new(plc_radio)),
    );
    let task = tokio::spawn(scheduler.run());
    Harness {
        device,
        handles,
        supervisor,
        task,
        seq: 0,
    }
}

impl Harness {
    async fn send(&mut self, packet: RplcPacket) {
        self.seq += 1;
        let frame = packet.into_frame(self.seq);
        self.supervisor
            .send(PLC_PORT, &frame)
            .await
            .expect("supervisor send");
    }

    async fn send_mgmt(&mut self, packet: MgmtPacket) {
        self.seq += 1;
        let frame = packet.into_frame(self.seq);
        self.supervisor
            .send(PLC_PORT, &frame)
            .await
            .expect("supervisor send");
    }

    async fn recv_rplc(&mut self) -> RplcPacket {
        loop {
            let message = timeout(Duration::from_secs(30), self.supervisor.recv())
                .await
                .expect("plc fell silent")
                .expect("radio closed");
            let frame = ScadaFrame::receive(&message).expect("frame decodes");
            if let Ok(packet) = RplcPacket::decode(&frame) {
                return packet;
            }
        }
    }

    /// Collect RPLC packets until `window` of virtual time passes.
    async fn drain_for(&mut self, window: Duration) -> Vec<RplcPacket> {
        let deadline = tokio::time::Instant::now() + window;
        let mut packets = Vec::new();
        loop {
            match timeout_at(deadline, self.supervisor.recv()).await {
                Ok(Ok(message)) => {
                    let frame = ScadaFrame::receive(&message).expect("frame decodes");
                    if let Ok(packet) = RplcPacket::decode(&frame) {
                        packets.push(packet);
                    }
                }
                Ok(Err(_)) | Err(_) => return packets,
            }
        }
    }

    async fn link(&mut self) {
        // answer the first pending link request, then confirm the link
        let request = self.recv_rplc().await;
        assert_eq!(request.kind, RplcType::LinkReq);
        self.send(RplcPacket::link_reply(7, LinkResult::Allow)).await;
        self.send_mgmt(MgmtPacket::remote_linked()).await;
    }

    async fn next_status(&mut self) -> RplcPacket {
        loop {
            let packet = self.recv_rplc().await;
            if packet.kind == RplcType::Status {
                return packet;
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn cold_boot_emits_link_request_with_unit_id() {
    let mut harness = start_plc();

    // scenario 1: boot latches scram and the first outbound frame is a
    // LINK_REQ carrying payload [7, 0] within the first link interval
    let message = timeout(Duration::from_secs(2), harness.supervisor.recv())
        .await
        .expect("link request within one second")
        .expect("radio open");
    let frame = ScadaFrame::receive(&message).expect("frame decodes");
    assert_eq!(frame.data()[0], FieldValue::Uint(7));
    assert_eq!(frame.data()[1], FieldValue::Uint(0));
    let packet = RplcPacket::decode(&frame).expect("packet decodes");
    assert_eq!(packet.kind, RplcType::LinkReq);
    assert_eq!(packet.plc_id, 7);

    harness.handles.terminate();
    harness.task.await.expect("join").expect("clean exit");
}

#[tokio::test(start_paused = true)]
async fn link_then_status_reports_boot_latch() {
    let mut harness = start_plc();
    harness.link().await;

    // scenario 2: STATUS follows within the status interval, carrying the
    // boot scram latch and a clear cause set
    let status = harness.next_status().await;
    assert_eq!(status.plc_id, 7);
    let report = status.status_report().expect("status body");
    assert!(report.scram, "boot latch visible in telemetry");
    assert!(!report.degraded);
    assert!(report.iss_status.is_empty());

    harness.handles.terminate();
    harness.task.await.expect("join").expect("clean exit");
}

#[tokio::test(start_paused = true)]
async fn modem_detach_commands_reactor_off() {
    let mut harness = start_plc();
    harness.link().await;

    // clear the boot latch, then bring the reactor online
    harness.send(RplcPacket::reset_command(7)).await;
    harness.send(RplcPacket::enable_command(7)).await;
    let mut online = false;
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if harness.device.active() {
            online = true;
            break;
        }
    }
    assert!(online, "reactor enabled after reset");

    // scenario 3: modem loss scrams immediately
    harness.handles.detach_modem();
    let mut stopped = false;
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if !harness.device.active() {
            stopped = true;
            break;
        }
    }
    assert!(stopped, "reactor commanded off after modem loss");
    assert!(harness.device.scram_count() > 0);

    harness.handles.terminate();
    harness.task.await.expect("join").expect("clean exit");
}

#[tokio::test(start_paused = true)]
async fn iss_trip_raises_exactly_one_alarm_per_edge() {
    let mut harness = start_plc();
    harness.link().await;
    harness.send(RplcPacket::reset_command(7)).await;

    // let the cleared state settle, then overheat the core
    tokio::time::sleep(Duration::from_millis(200)).await;
    harness.drain_for(Duration::from_millis(100)).await;
    harness.device.set_sample(IssSample {
        temp_kelvin: 1_500.0,
        ..IssSample::nominal()
    });

    // scenario 4: exactly one RPS_ALARM on the rising edge, none while held
    let packets = harness.drain_for(Duration::from_secs(2)).await;
    let alarms: Vec<_> = packets
        .iter()
        .filter(|p| p.kind == RplcType::RpsAlarm)
        .collect();
    assert_eq!(alarms.len(), 1, "one alarm per rising edge");
    let cause = alarms[0].alarm_status().expect("alarm body");
    assert!(cause.contains(IssStatus::TEMP_CRIT));

    // the latch is visible in subsequent telemetry
    let status = packets
        .iter()
        .filter_map(|p| p.status_report())
        .last()
        .expect("status frames during the window");
    assert!(status.scram);
    assert!(status.iss_status.contains(IssStatus::TEMP_CRIT));

    harness.handles.terminate();
    harness.task.await.expect("join").expect("clean exit");
}

#[tokio::test(start_paused = true)]
async fn watchdog_timeout_unlinks_and_latches_scram() {
    let mut harness = start_plc();
    harness.link().await;
    harness.send(RplcPacket::reset_command(7)).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    harness.drain_for(Duration::from_millis(100)).await;

    // scenario 5: supervisor goes silent past the 3 s watchdog
    let packets = harness.drain_for(Duration::from_secs(4)).await;
    let resumed_link_requests = packets
        .iter()
        .filter(|p| p.kind == RplcType::LinkReq)
        .count();
    assert!(
        resumed_link_requests > 0,
        "link-request cadence resumes after the timeout"
    );

    // relink and confirm the TIMEOUT cause latched the scram
    harness.send(RplcPacket::link_reply(7, LinkResult::Allow)).await;
    let status = harness.next_status().await.status_report().expect("body");
    assert!(status.scram);
    assert!(status.iss_status.contains(IssStatus::TIMEOUT));

    harness.handles.terminate();
    harness.task.await.expect("join").expect("clean exit");
}

#[tokio::test(start_paused = true)]
async fn terminate_scrams_once_more_and_exits() {
    let harness = start_plc();
    harness.device.set_active(true);

    // scenario 6: one final scram attempt, then a clean exit
    harness.handles.terminate();
    harness.task.await.expect("join").expect("clean exit");
    assert!(!harness.device.active(), "final scram commanded the reactor off");
    assert!(harness.device.scram_count() > 0);
}

#[tokio::test(start_paused = true)]
async fn reactor_swap_scrams_the_replacement() {
    let mut harness = start_plc();
    harness.link().await;

    harness.handles.detach_reactor();
    // absorb telemetry from before the detach landed
    harness.drain_for(Duration::from_millis(300)).await;

    // degraded telemetry while the reactor is missing
    let report = harness.next_status().await.status_report().expect("body");
    assert!(report.degraded);
    assert!(report.scram);

    let replacement = SimReactor::new();
    replacement.set_active(true);
    harness
        .handles
        .reconnect_reactor(Box::new(replacement.handle()));
    let mut stopped = false;
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if !replacement.active() {
            stopped = true;
            break;
        }
    }
    assert!(stopped, "replacement reactor starts commanded off");

    harness.drain_for(Duration::from_millis(200)).await;
    let report = harness.next_status().await.status_report().expect("body");
    assert!(!report.degraded, "node re-initialized after recovery");
    assert!(report.scram, "boot latch re-applied on recovery");

    harness.handles.terminate();
    harness.task.await.expect("join").expect("clean exit");
}
