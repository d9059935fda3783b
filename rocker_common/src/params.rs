//! Parameter id tables for SET/GET commands.
//!
//! The numeric ids are part of the host protocol and must never be renumbered.
//! Ids follow the TMCL numbering where a TMCL equivalent exists.

use core::ops::RangeInclusive;

use crate::consts::{MAX_ACCELERATION, MAX_VELOCITY};

/// Read/write access of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Which record owns the parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamGroup {
    /// `MotorConfig` field.
    Motor,
    /// `ClosedLoopConfig` field.
    ClosedLoop,
    /// `CoolStepConfig` field.
    CoolStep,
    /// Runtime state held by the control components.
    Runtime,
}

macro_rules! axis_params {
    ($( $(#[$doc:meta])* $name:ident = $id:literal, $group:ident, $access:ident; )*) => {
        /// Axis parameter selector (`type` byte of SAP/GAP).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum AxisParam {
            $( $(#[$doc])* $name = $id, )*
        }

        impl AxisParam {
            /// Every axis parameter, in table order.
            pub const ALL: &'static [AxisParam] = &[$(AxisParam::$name,)*];

            /// Convert from raw `u8`. Returns `None` for unknown ids.
            #[inline]
            pub const fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $( $id => Some(Self::$name), )*
                    _ => None,
                }
            }

            /// Owning record.
            #[inline]
            pub const fn group(self) -> ParamGroup {
                match self {
                    $( Self::$name => ParamGroup::$group, )*
                }
            }

            /// Access class.
            #[inline]
            pub const fn access(self) -> Access {
                match self {
                    $( Self::$name => Access::$access, )*
                }
            }
        }
    };
}

axis_params! {
    /// Target of the current MOVE-TO, or last commanded position.
    TargetPosition = 0, Runtime, ReadOnly;
    /// Encoder-measured position [microsteps].
    ActualPosition = 1, Runtime, ReadOnly;
    /// Requested velocity.
    TargetVelocity = 2, Runtime, ReadOnly;
    /// Filtered encoder velocity.
    ActualVelocity = 3, Runtime, ReadOnly;
    MaxVelocity = 4, Motor, ReadWrite;
    AMax = 5, Motor, ReadWrite;
    RunCurrent = 6, Motor, ReadWrite;
    StandbyCurrent = 7, Motor, ReadWrite;
    /// 1 when the MOVE-TO target has been reached.
    PositionReached = 8, Runtime, ReadOnly;
    SwitchMode = 12, Motor, ReadWrite;
    RampType = 14, Motor, ReadWrite;
    AStart = 15, Motor, ReadWrite;
    DFinal = 16, Motor, ReadWrite;
    DMax = 17, Motor, ReadWrite;
    DStop = 18, Motor, ReadWrite;
    GammaVMin = 108, ClosedLoop, ReadWrite;
    GammaVAdd = 109, ClosedLoop, ReadWrite;
    Gamma = 110, ClosedLoop, ReadWrite;
    Beta = 111, ClosedLoop, ReadWrite;
    Offset = 112, ClosedLoop, ReadWrite;
    CurrentScalerMinimum = 113, ClosedLoop, ReadWrite;
    CurrentScalerMaximum = 114, ClosedLoop, ReadWrite;
    CurrentScalerStartUp = 115, ClosedLoop, ReadWrite;
    UpscaleDelay = 116, ClosedLoop, ReadWrite;
    DownscaleDelay = 117, ClosedLoop, ReadWrite;
    CorrectionVelocityP = 118, ClosedLoop, ReadWrite;
    CorrectionVelocityI = 119, ClosedLoop, ReadWrite;
    CorrectionVelocityIClip = 120, ClosedLoop, ReadWrite;
    CorrectionVelocityDClk = 121, ClosedLoop, ReadWrite;
    CorrectionVelocityDClip = 122, ClosedLoop, ReadWrite;
    PositionCorrectionP = 123, ClosedLoop, ReadWrite;
    PositionCorrectionTolerance = 124, ClosedLoop, ReadWrite;
    PositionWindow = 125, ClosedLoop, ReadWrite;
    EncVMeanWait = 126, ClosedLoop, ReadWrite;
    EncVMeanFilter = 127, ClosedLoop, ReadWrite;
    EncVMeanInt = 128, ClosedLoop, ReadWrite;
    ClosedLoopMode = 129, ClosedLoop, ReadWrite;
    EncoderCorrectionYOffset = 130, ClosedLoop, ReadWrite;
    MicrostepResolution = 140, Motor, ReadWrite;
    CoolStepLowerThreshold = 172, CoolStep, ReadWrite;
    CoolStepUpperThreshold = 173, CoolStep, ReadWrite;
    CoolStepEnable = 175, CoolStep, ReadWrite;
    /// Actual current scaler value.
    SmartEnergy = 180, Runtime, ReadOnly;
    StallVMin = 181, Motor, ReadWrite;
    ThresholdSpeed = 182, CoolStep, ReadWrite;
    SlowRunCurrent = 183, CoolStep, ReadWrite;
    BoostCurrent = 200, Motor, ReadWrite;
    MotorResolution = 202, Motor, ReadWrite;
    /// 1 = drive disabled, commands rejected.
    MotorDisable = 203, Runtime, ReadWrite;
    FreewheelingDelay = 204, Motor, ReadWrite;
    StandbyFlag = 205, Runtime, ReadOnly;
    /// Last load sample.
    StallLevel = 206, Runtime, ReadOnly;
    DriverFlags = 207, Runtime, ReadOnly;
    StallFlag = 208, Runtime, ReadOnly;
    /// Raw encoder counts including the encoder offset.
    EncoderPosition = 209, Runtime, ReadOnly;
    EncoderResolution = 210, Motor, ReadWrite;
    /// Latched deviation fault; writing 0 re-enables the axis.
    DeviationFlag = 211, Runtime, ReadWrite;
    MaxPositionDeviation = 212, Motor, ReadWrite;
    MaxVelocityDeviation = 213, Motor, ReadWrite;
    SettingDelay = 214, Motor, ReadWrite;
    FreewheelingActive = 217, Runtime, ReadOnly;
    VMaxModified = 218, Runtime, ReadOnly;
    ClosedLoopState = 219, Runtime, ReadOnly;
    ClosedLoopPositionOffset = 220, CoolStep, ReadWrite;
    EncoderOffset = 221, CoolStep, ReadWrite;
    GearRatio = 222, CoolStep, ReadWrite;
    StepDirMode = 254, Motor, ReadWrite;
    UnitMode = 255, Motor, ReadWrite;
}

impl AxisParam {
    /// `true` for parameters stored in the configuration records.
    #[inline]
    pub const fn is_config(self) -> bool {
        !matches!(self.group(), ParamGroup::Runtime)
    }

    /// Accepted value range for writable parameters.
    pub const fn bounds(self) -> Option<RangeInclusive<i32>> {
        use AxisParam::*;
        let range = match self {
            MaxVelocity | StallVMin | ThresholdSpeed => 0..=MAX_VELOCITY,
            AMax | AStart | DFinal | DMax | DStop => 0..=MAX_ACCELERATION,
            RunCurrent | StandbyCurrent | BoostCurrent | SlowRunCurrent => 0..=255,
            CurrentScalerMinimum | CurrentScalerMaximum | CurrentScalerStartUp => 0..=255,
            SwitchMode => 0..=3,
            RampType => 0..=2,
            MicrostepResolution => 0..=8,
            MotorResolution => 1..=1024,
            EncoderResolution => 1..=65535,
            FreewheelingDelay | SettingDelay => 0..=65535,
            StepDirMode | UnitMode | ClosedLoopMode | CoolStepEnable | MotorDisable => 0..=1,
            MaxPositionDeviation | MaxVelocityDeviation => 0..=i32::MAX,
            GammaVMin | GammaVAdd => 0..=16_777_215,
            Gamma | Beta | CoolStepLowerThreshold | CoolStepUpperThreshold => 0..=1023,
            UpscaleDelay | DownscaleDelay => 0..=16_777_215,
            CorrectionVelocityP | CorrectionVelocityI | PositionCorrectionP => 0..=16_777_215,
            CorrectionVelocityIClip | CorrectionVelocityDClip => 0..=i32::MAX,
            CorrectionVelocityDClk | EncVMeanInt => 0..=65535,
            PositionCorrectionTolerance | PositionWindow => 0..=i32::MAX,
            EncVMeanWait => 0..=255,
            EncVMeanFilter => 0..=32,
            Offset | EncoderCorrectionYOffset => i32::MIN..=i32::MAX,
            ClosedLoopPositionOffset | EncoderOffset => i32::MIN..=i32::MAX,
            GearRatio => 1..=65535,
            DeviationFlag => 0..=0,
            TargetPosition | ActualPosition | TargetVelocity | ActualVelocity
            | PositionReached | SmartEnergy | StandbyFlag | StallLevel | DriverFlags
            | StallFlag | EncoderPosition | FreewheelingActive | VMaxModified
            | ClosedLoopState => return None,
        };
        Some(range)
    }
}

/// Global parameter selector (`type` byte of SGP/GGP, bank 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GlobalParam {
    SerialBitrate = 65,
    ModuleAddress = 66,
    CanBitrate = 69,
    CanSendId = 70,
    CanReceiveId = 71,
    SecondaryId = 72,
    HostAddress = 76,
    /// Scheduler tick counter.
    TickTimer = 132,
}

impl GlobalParam {
    /// Every global parameter, in table order.
    pub const ALL: &'static [GlobalParam] = &[
        Self::SerialBitrate,
        Self::ModuleAddress,
        Self::CanBitrate,
        Self::CanSendId,
        Self::CanReceiveId,
        Self::SecondaryId,
        Self::HostAddress,
        Self::TickTimer,
    ];

    /// Convert from raw `u8`. Returns `None` for unknown ids.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            65 => Some(Self::SerialBitrate),
            66 => Some(Self::ModuleAddress),
            69 => Some(Self::CanBitrate),
            70 => Some(Self::CanSendId),
            71 => Some(Self::CanReceiveId),
            72 => Some(Self::SecondaryId),
            76 => Some(Self::HostAddress),
            132 => Some(Self::TickTimer),
            _ => None,
        }
    }

    #[inline]
    pub const fn access(self) -> Access {
        match self {
            Self::TickTimer => Access::ReadOnly,
            _ => Access::ReadWrite,
        }
    }

    /// Accepted value range (`None` for read-only parameters).
    pub const fn bounds(self) -> Option<RangeInclusive<i32>> {
        let range = match self {
            Self::SerialBitrate => 0..=11,
            Self::ModuleAddress => 1..=255,
            Self::CanBitrate => 1..=8,
            Self::CanSendId | Self::CanReceiveId | Self::SecondaryId => 0..=0x7FF,
            Self::HostAddress => 0..=255,
            Self::TickTimer => return None,
        };
        Some(range)
    }
}
