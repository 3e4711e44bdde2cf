// Serial protocol for the omnibase drive pods
//
// Each wheel is a "pod": a motor controller speaking a Dynamixel-1.0-style
// framing over a shared half-duplex serial bus. The gyro breakout sits on
// the same bus as its own pod.
// Packet format: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]

use std::cell::RefCell;
use std::io::{Read, Write};
use std::rc::Rc;
use std::time::Duration;

use serialport::{self, SerialPort};
use tracing::{debug, info, warn};

use crate::config::{
    POD_ID_GYRO, POD_ID_LEFT_BACK, POD_ID_LEFT_FRONT, POD_ID_RIGHT_BACK, POD_ID_RIGHT_FRONT,
};

use super::{DeviceError, Drivetrain, DriveMotor, HeadingSensor, SystemClock};

/// Default serial configuration for the pod bus
pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Instruction set
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
}

/// Register map shared by the drive and gyro pods
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    // EEPROM area
    ModelNumber = 3, // 2 bytes, read-only
    Id = 5,          // 1 byte

    // RAM area
    ControlMode = 11,     // 1 byte: 0=position servo, 2=raw PWM
    TorqueEnable = 24,    // 1 byte: 0=off, 1=on
    GoalPwm = 30,         // 2 bytes signed LE, [-127, 127]
    PresentPosition = 36, // 4 bytes signed LE, accumulated ticks since tare
    TareControl = 44,     // write 1 to zero the accumulated counter
    PresentYaw = 48,      // 4 bytes signed LE, centidegrees (gyro pod)
    ZeroYaw = 52,         // write 1 to zero the accumulated yaw (gyro pod)
}

/// Control modes understood by the drive pods
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlMode {
    Position = 0,
    Velocity = 1,
    Pwm = 2,
}

/// Error types for pod bus communication
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from pod {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for pod {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Pod {id} returned error status: 0x{status:02X}")]
    PodFault { id: u8, status: u8 },

    #[error("Timeout waiting for response from pod {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, BusError>;

/// Pod bus - handles serial communication with the drive and gyro pods
pub struct PodBus {
    port: Box<dyn SerialPort>,
}

impl PodBus {
    /// Open a new connection to the pod bus
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    /// Complement checksum over everything after the header
    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 2) as u8; // instruction + checksum
        let mut packet = Vec::with_capacity(6 + params.len());

        packet.extend_from_slice(&HEADER);
        packet.push(id);
        packet.push(length);
        packet.push(instruction as u8);
        packet.extend_from_slice(params);

        let checksum_data = &packet[2..]; // skip header
        packet.push(Self::checksum(checksum_data));

        packet
    }

    fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read a status packet, returning its parameter bytes
    fn read_response(&mut self, expected_id: u8) -> Result<Vec<u8>> {
        let mut header = [0u8; 2];
        self.port.read_exact(&mut header).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                BusError::Timeout { id: expected_id }
            } else {
                BusError::Io(e)
            }
        })?;

        if header != HEADER {
            return Err(BusError::InvalidResponse {
                id: expected_id,
                reason: format!("Invalid header: {:02X?}", header),
            });
        }

        let mut id_length = [0u8; 2];
        self.port.read_exact(&mut id_length)?;
        let id = id_length[0];
        let length = id_length[1] as usize;

        if id != expected_id {
            return Err(BusError::InvalidResponse {
                id: expected_id,
                reason: format!("ID mismatch: expected {}, got {}", expected_id, id),
            });
        }

        // error byte + params + checksum = length bytes
        let mut remaining = vec![0u8; length];
        self.port.read_exact(&mut remaining)?;

        let mut checksum_data = vec![id, length as u8];
        checksum_data.extend_from_slice(&remaining[..remaining.len() - 1]);
        let expected_checksum = Self::checksum(&checksum_data);
        let received_checksum = remaining[remaining.len() - 1];

        if expected_checksum != received_checksum {
            return Err(BusError::ChecksumMismatch { id });
        }

        let error_status = remaining[0];
        if error_status != 0 {
            return Err(BusError::PodFault {
                id,
                status: error_status,
            });
        }

        Ok(remaining[1..remaining.len() - 1].to_vec())
    }

    /// Ping a pod to check if it's on the bus
    pub fn ping(&mut self, id: u8) -> Result<bool> {
        let packet = Self::build_packet(id, Instruction::Ping, &[]);
        self.send_packet(&packet)?;

        match self.read_response(id) {
            Ok(_) => Ok(true),
            Err(BusError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Write a single byte to a register
    pub fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        let params = [register as u8, value];
        let packet = Self::build_packet(id, Instruction::Write, &params);
        debug!("Write u8 to pod {}: reg={:?}, value={}", id, register, value);
        self.send_packet(&packet)?;

        let _ = self.read_response(id)?;
        Ok(())
    }

    /// Write a signed 16-bit value (little-endian) to a register
    pub fn write_i16(&mut self, id: u8, register: Register, value: i16) -> Result<()> {
        let bytes = value.to_le_bytes();
        let params = [register as u8, bytes[0], bytes[1]];
        let packet = Self::build_packet(id, Instruction::Write, &params);
        self.send_packet(&packet)?;

        let _ = self.read_response(id)?;
        Ok(())
    }

    /// Read a signed 32-bit value (little-endian) from a register
    pub fn read_i32(&mut self, id: u8, register: Register) -> Result<i32> {
        let params = [register as u8, 4]; // address, length
        let packet = Self::build_packet(id, Instruction::Read, &params);
        self.send_packet(&packet)?;

        let response = self.read_response(id)?;
        if response.len() < 4 {
            return Err(BusError::InvalidResponse {
                id,
                reason: format!("Expected 4 bytes, got {}", response.len()),
            });
        }
        Ok(i32::from_le_bytes([
            response[0],
            response[1],
            response[2],
            response[3],
        ]))
    }

    // === High-level pod operations ===

    /// Command a raw PWM power in [-127, 127] (pod must be in PWM mode)
    pub fn set_pwm(&mut self, id: u8, power: i16) -> Result<()> {
        self.write_i16(id, Register::GoalPwm, power)
    }

    /// Read the accumulated encoder position in ticks
    pub fn get_position(&mut self, id: u8) -> Result<i32> {
        self.read_i32(id, Register::PresentPosition)
    }

    /// Zero a pod's accumulated encoder counter
    pub fn tare_position(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TareControl, 1)
    }

    /// Read the gyro pod's accumulated yaw in degrees
    pub fn get_yaw(&mut self, id: u8) -> Result<f64> {
        let centidegrees = self.read_i32(id, Register::PresentYaw)?;
        Ok(centidegrees as f64 / 100.0)
    }

    /// Zero the gyro pod's accumulated yaw
    pub fn zero_yaw(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::ZeroYaw, 1)
    }

    /// Switch a drive pod's control mode (requires torque off)
    pub fn set_control_mode(&mut self, id: u8, mode: ControlMode) -> Result<()> {
        self.write_u8(id, Register::ControlMode, mode as u8)
    }

    /// Enable torque on a drive pod
    pub fn enable_torque(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 1)
    }

    /// Disable torque on a drive pod
    pub fn disable_torque(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 0)
    }
}

type SharedBus = Rc<RefCell<PodBus>>;

/// A drive pod on the shared bus
pub struct BusMotor {
    bus: SharedBus,
    id: u8,
}

impl DriveMotor for BusMotor {
    fn set_power(&mut self, power: i16) -> super::Result<()> {
        self.bus.borrow_mut().set_pwm(self.id, power)?;
        Ok(())
    }

    fn position(&mut self) -> super::Result<i32> {
        Ok(self.bus.borrow_mut().get_position(self.id)?)
    }

    fn reset_position(&mut self) -> super::Result<()> {
        self.bus.borrow_mut().tare_position(self.id)?;
        Ok(())
    }
}

impl Drop for BusMotor {
    fn drop(&mut self) {
        // Try to stop the pod when its handle goes away (safety measure)
        if let Err(e) = self.bus.borrow_mut().set_pwm(self.id, 0) {
            warn!("Failed to stop pod {} on drop: {}", self.id, e);
        }
    }
}

/// The gyro pod on the shared bus
pub struct BusGyro {
    bus: SharedBus,
    id: u8,
}

impl HeadingSensor for BusGyro {
    fn heading(&mut self) -> super::Result<f64> {
        Ok(self.bus.borrow_mut().get_yaw(self.id)?)
    }

    fn reset(&mut self) -> super::Result<()> {
        self.bus.borrow_mut().zero_yaw(self.id)?;
        Ok(())
    }
}

/// Open the pod bus and wire up a ready-to-drive [`Drivetrain`]
///
/// Pings every pod, switches the drive pods to PWM mode (torque off first,
/// as the pods require), and re-enables torque.
pub fn open_drivetrain(
    port: &str,
) -> std::result::Result<(Drivetrain<BusMotor, BusGyro>, SystemClock), DeviceError> {
    info!("Opening pod bus on {}", port);
    let mut bus = PodBus::open(port)?;

    let drive_ids = [
        POD_ID_LEFT_FRONT,
        POD_ID_LEFT_BACK,
        POD_ID_RIGHT_FRONT,
        POD_ID_RIGHT_BACK,
    ];

    for id in drive_ids.into_iter().chain([POD_ID_GYRO]) {
        match bus.ping(id) {
            Ok(true) => debug!("Pod {} responding", id),
            Ok(false) => {
                warn!("Pod {} not responding to ping", id);
                return Err(BusError::Timeout { id }.into());
            }
            Err(e) => return Err(e.into()),
        }
    }

    for &id in &drive_ids {
        bus.disable_torque(id)?;
        bus.set_control_mode(id, ControlMode::Pwm)?;
        bus.enable_torque(id)?;
    }

    info!("Drive pods initialized for PWM control");

    let shared: SharedBus = Rc::new(RefCell::new(bus));
    let motor = |id: u8| BusMotor {
        bus: Rc::clone(&shared),
        id,
    };

    let drivetrain = Drivetrain::new(
        motor(POD_ID_LEFT_FRONT),
        motor(POD_ID_LEFT_BACK),
        motor(POD_ID_RIGHT_FRONT),
        motor(POD_ID_RIGHT_BACK),
        BusGyro {
            bus: Rc::clone(&shared),
            id: POD_ID_GYRO,
        },
    );

    Ok((drivetrain, SystemClock))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        // ID=1, Length=4, Instruction=WRITE, Addr=30, Data=0, 2
        let data = [1u8, 4, 0x03, 30, 0, 2];
        let checksum = PodBus::checksum(&data);
        // ~(1+4+3+30+0+2) = ~40 = 215
        assert_eq!(checksum, 215);
    }

    #[test]
    fn test_build_ping_packet() {
        let packet = PodBus::build_packet(1, Instruction::Ping, &[]);
        // Header (2) + ID (1) + Length (1) + Instruction (1) + Checksum (1)
        assert_eq!(packet.len(), 6);
        assert_eq!(packet[0], 0xFF);
        assert_eq!(packet[1], 0xFF);
        assert_eq!(packet[2], 1); // ID
        assert_eq!(packet[3], 2); // Length (instruction + checksum)
        assert_eq!(packet[4], 0x01); // PING instruction
    }

    #[test]
    fn test_build_pwm_write_packet() {
        let bytes = (-100i16).to_le_bytes();
        let packet = PodBus::build_packet(
            3,
            Instruction::Write,
            &[Register::GoalPwm as u8, bytes[0], bytes[1]],
        );
        assert_eq!(packet[2], 3); // ID
        assert_eq!(packet[3], 5); // instruction + 3 params + checksum
        assert_eq!(packet[4], 0x03); // WRITE
        assert_eq!(packet[5], 30); // GoalPwm register
        assert_eq!(
            i16::from_le_bytes([packet[6], packet[7]]),
            -100,
            "PWM payload is plain little-endian two's complement"
        );
    }

    #[test]
    fn test_yaw_scaling() {
        // 9035 centidegrees on the wire -> 90.35 degrees; the conversion is
        // the only arithmetic between the wire format and the motion core
        let raw = i32::from_le_bytes([0x4B, 0x23, 0x00, 0x00]);
        assert_eq!(raw, 9035);
        assert_eq!(raw as f64 / 100.0, 90.35);

        // Accumulated yaw past a full negative turn stays signed 32-bit
        let raw = i32::from_le_bytes((-36550i32).to_le_bytes());
        assert_eq!(raw as f64 / 100.0, -365.5);
    }
}
