//! Routines
//!
//! Short command sequences for common jobs. Each one blocks on the
//! connection and, where the brick needs time to act, on the supplied
//! delay.

use brickline_hal::Stream;
use brickline_protocol::commands::{
    GetBatteryLevel, GetInputValues, GetOutputState, SetOutputState,
};
use brickline_protocol::replies::{BatteryResponse, InputValues, OutputState};
use brickline_protocol::{Command, InputPort, OutputPort, RegulationMode, RunState};
use embedded_hal::delay::DelayNs;

use crate::link::{Connection, LinkError};

/// Power used by [`cycle_motor`]
pub const CYCLE_POWER: i8 = 60;

/// How long [`cycle_motor`] runs in each direction
pub const CYCLE_PHASE_MS: u32 = 2_000;

/// Poll interval of [`wait_for_motor`]
pub const MOTOR_POLL_MS: u32 = 100;

/// Battery voltage in volts
pub fn get_voltage<S: Stream>(conn: &mut Connection<S>) -> Result<f32, LinkError> {
    let reply: BatteryResponse = conn.query(&GetBatteryLevel)?;
    Ok(reply.voltage())
}

/// Turn a motor one way, then the other, then let it coast
pub fn cycle_motor<S, D>(
    conn: &mut Connection<S>,
    delay: &mut D,
    port: OutputPort,
) -> Result<(), LinkError>
where
    S: Stream,
    D: DelayNs,
{
    conn.send(&SetOutputState::running(port, CYCLE_POWER)?)?;
    delay.delay_ms(CYCLE_PHASE_MS);
    conn.send(&SetOutputState::running(port, -CYCLE_POWER)?)?;
    delay.delay_ms(CYCLE_PHASE_MS);
    conn.send(&SetOutputState::idle(port))
}

/// Run two motors in lock-step for `duration_ms`, then stop both
///
/// Both ports are first put under motor-sync regulation; the brick only
/// synchronises motors that are regulated together.
pub fn sync_motors<S, D>(
    conn: &mut Connection<S>,
    delay: &mut D,
    ports: [OutputPort; 2],
    power: i8,
    duration_ms: u32,
) -> Result<(), LinkError>
where
    S: Stream,
    D: DelayNs,
{
    let mut cmd = SetOutputState {
        use_regulation: true,
        regulation_mode: RegulationMode::MotorSync,
        ..SetOutputState::idle(ports[0])
    }
    .validated()?;

    for port in ports {
        cmd.update(|c| c.port = port)?;
        conn.send(&cmd)?;
    }

    cmd.update(|c| {
        c.run_state = RunState::Running;
        c.set_power = power;
        c.motor_on = true;
    })?;
    conn.send(&cmd)?;

    delay.delay_ms(duration_ms);

    for port in ports {
        conn.send(&SetOutputState::idle(port))?;
    }
    Ok(())
}

/// Poll a motor until it leaves the running state
pub fn wait_for_motor<S, D>(
    conn: &mut Connection<S>,
    delay: &mut D,
    port: OutputPort,
) -> Result<OutputState, LinkError>
where
    S: Stream,
    D: DelayNs,
{
    let query = GetOutputState::new(port);
    loop {
        let state: OutputState = conn.query(&query)?;
        trace!("motor run state {:?}", state.run_state);
        if state.run_state.known() != Some(RunState::Running) {
            return Ok(state);
        }
        delay.delay_ms(MOTOR_POLL_MS);
    }
}

/// Current readings of the sensor on `port`
pub fn read_input<S: Stream>(
    conn: &mut Connection<S>,
    port: InputPort,
) -> Result<InputValues, LinkError> {
    conn.query(&GetInputValues::new(port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickline_hal::MemoryStream;
    use brickline_protocol::replies::Status;
    use brickline_protocol::{Body, Command, Message, ModeByte, Reply, Reported};

    /// Records requested delays instead of sleeping
    #[derive(Default)]
    struct FakeDelay {
        total_ns: u64,
    }

    impl DelayNs for FakeDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += ns as u64;
        }
    }

    /// Split everything written into decoded command bodies
    fn sent(written: &[u8]) -> Vec<Body> {
        let mut out = Vec::new();
        let mut rest = written;
        while !rest.is_empty() {
            let len = u16::from_le_bytes([rest[0], rest[1]]) as usize;
            let msg = Message::from_payload(&rest[2..2 + len]).unwrap();
            out.push(msg.into_body().unwrap());
            rest = &rest[2 + len..];
        }
        out
    }

    fn output_state_frame(run_state: RunState) -> Vec<u8> {
        let reply = OutputState {
            status: Status::SUCCESS,
            port: OutputPort::B,
            power_set: 75,
            mode: ModeByte::from_flags(true, false, true),
            regulation_mode: RegulationMode::MotorSync.into(),
            turn_ratio: 0,
            run_state: run_state.into(),
            tacho_limit: 2850,
            tacho_count: 100,
            block_tacho_count: 100,
            rotation_count: 100,
        };
        let payload = reply.render().unwrap();
        let mut frame = (payload.len() as u16).to_le_bytes().to_vec();
        frame.extend_from_slice(&payload);
        frame
    }

    #[test]
    fn test_get_voltage() {
        let stream =
            MemoryStream::<64>::with_rx(&[0x05, 0x00, 0x02, 0x0B, 0x00, 0x4C, 0x1D]).unwrap();
        let mut conn = Connection::new(stream);
        let volts = get_voltage(&mut conn).unwrap();
        assert!((volts - 7.5).abs() < 1e-4);
    }

    #[test]
    fn test_cycle_motor_sequence() {
        let mut conn = Connection::new(MemoryStream::<128>::new());
        let mut delay = FakeDelay::default();
        cycle_motor(&mut conn, &mut delay, OutputPort::A).unwrap();

        assert_eq!(delay.total_ns, 2 * CYCLE_PHASE_MS as u64 * 1_000_000);
        let cmds = sent(conn.stream().written());
        assert_eq!(
            cmds,
            vec![
                Body::SetOutputState(SetOutputState::running(OutputPort::A, 60).unwrap()),
                Body::SetOutputState(SetOutputState::running(OutputPort::A, -60).unwrap()),
                Body::SetOutputState(SetOutputState::idle(OutputPort::A)),
            ]
        );
    }

    #[test]
    fn test_sync_motors_sequence() {
        let mut conn = Connection::new(MemoryStream::<256>::new());
        let mut delay = FakeDelay::default();
        sync_motors(
            &mut conn,
            &mut delay,
            [OutputPort::B, OutputPort::C],
            100,
            2_000,
        )
        .unwrap();

        let cmds = sent(conn.stream().written());
        assert_eq!(cmds.len(), 5);
        let Body::SetOutputState(run) = &cmds[2] else {
            panic!("expected SetOutputState");
        };
        assert_eq!(run.port, OutputPort::C);
        assert_eq!(run.set_power, 100);
        assert_eq!(run.mode_byte().bits(), 5);
        assert_eq!(run.regulation_mode, RegulationMode::MotorSync);
        assert_eq!(
            cmds[4],
            Body::SetOutputState(SetOutputState::idle(OutputPort::C))
        );
    }

    #[test]
    fn test_sync_motors_rejects_power() {
        let mut conn = Connection::new(MemoryStream::<256>::new());
        let mut delay = FakeDelay::default();
        let result = sync_motors(
            &mut conn,
            &mut delay,
            [OutputPort::B, OutputPort::C],
            -120,
            2_000,
        );
        assert!(matches!(result, Err(LinkError::Protocol(_))));
        // Regulation setup went out; nothing started
        assert_eq!(sent(conn.stream().written()).len(), 2);
        assert_eq!(delay.total_ns, 0);
    }

    #[test]
    fn test_wait_for_motor() {
        let mut rx = output_state_frame(RunState::Running);
        rx.extend(output_state_frame(RunState::Idle));
        let mut conn = Connection::new(MemoryStream::<128>::with_rx(&rx).unwrap());
        let mut delay = FakeDelay::default();

        let state = wait_for_motor(&mut conn, &mut delay, OutputPort::B).unwrap();
        assert_eq!(state.run_state.known(), Some(RunState::Idle));
        assert_eq!(delay.total_ns, MOTOR_POLL_MS as u64 * 1_000_000);
        assert_eq!(
            sent(conn.stream().written()),
            vec![
                Body::GetOutputState(GetOutputState::new(OutputPort::B)),
                Body::GetOutputState(GetOutputState::new(OutputPort::B)),
            ]
        );
    }

    #[test]
    fn test_wait_for_motor_unknown_run_state() {
        let mut rx = output_state_frame(RunState::Running);
        let idle = rx.len();
        rx.extend(output_state_frame(RunState::Idle));
        // Run state byte sits after length, header, status, port, power, mode, regulation, turn
        rx[idle + 2 + 8] = 0x30;
        let mut conn = Connection::new(MemoryStream::<128>::with_rx(&rx).unwrap());
        let mut delay = FakeDelay::default();

        let state = wait_for_motor(&mut conn, &mut delay, OutputPort::B).unwrap();
        assert_eq!(state.run_state, Reported::Unknown(0x30));
        assert_eq!(delay.total_ns, MOTOR_POLL_MS as u64 * 1_000_000);
    }

    #[test]
    fn test_read_input() {
        let reply = InputValues {
            status: Status::SUCCESS,
            port: InputPort::new(1).unwrap(),
            valid: true,
            calibrated: false,
            sensor_type: brickline_protocol::SensorType::Switch.into(),
            mode: 0x20,
            raw_value: 183,
            normalized_value: 183,
            scaled_value: 1,
            calibrated_value: 0,
        };
        let payload = reply.render().unwrap();
        let mut rx = (payload.len() as u16).to_le_bytes().to_vec();
        rx.extend_from_slice(&payload);

        let mut conn = Connection::new(MemoryStream::<64>::with_rx(&rx).unwrap());
        let values = read_input(&mut conn, InputPort::new(1).unwrap()).unwrap();
        assert_eq!(values, reply);
        assert_eq!(
            conn.stream().written(),
            &GetInputValues::new(InputPort::new(1).unwrap()).to_frame().unwrap()[..]
        );
    }
}
