//! The closed set of message type codes spoken by the test-stand firmware.

use crate::error::{Result, WireError};

/// One byte code per message the firmware sends or accepts.
///
/// Codes are unique `u8` values fixed by the firmware; an unknown code is a
/// decode error, never a silent coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    AckValue = 1,
    Payload = 2,
    Text = 3,
    UnsetValve = 4,
    SetValve = 5,
    UnsetIgnition = 6,
    SetIgnition = 7,
    NormIgnite = 8,
    LcMainSend = 9,
    Lc1Send = 10,
    Lc2Send = 11,
    Lc3Send = 12,
    PtFeedSend = 13,
    PtInjeSend = 14,
    PtCombSend = 15,
    Tc1Send = 16,
    Tc2Send = 17,
    Tc3Send = 18,
    SetPvalve = 19,
    UnsetPvalve = 20,
    SetGitvc = 21,
    UnsetGitvc = 22,
    LeakCheck = 23,
    Fill = 24,
    FillIdle = 25,
    Default = 26,
}

/// One physical sensor channel on the stand: three auxiliary load cells,
/// the main thrust load cell, three pressure transducers, and three
/// thermocouples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    LcMain,
    Lc1,
    Lc2,
    Lc3,
    PtFeed,
    PtInje,
    PtComb,
    Tc1,
    Tc2,
    Tc3,
}

impl ChannelId {
    /// Every physical channel, in firmware code order.
    pub const ALL: [ChannelId; 10] = [
        ChannelId::LcMain,
        ChannelId::Lc1,
        ChannelId::Lc2,
        ChannelId::Lc3,
        ChannelId::PtFeed,
        ChannelId::PtInje,
        ChannelId::PtComb,
        ChannelId::Tc1,
        ChannelId::Tc2,
        ChannelId::Tc3,
    ];

    /// The label the firmware uses for this channel's on-disk logs.
    pub fn label(self) -> &'static str {
        match self {
            ChannelId::LcMain => "LC_MAIN",
            ChannelId::Lc1 => "LC1",
            ChannelId::Lc2 => "LC2",
            ChannelId::Lc3 => "LC3",
            ChannelId::PtFeed => "PT_FEED",
            ChannelId::PtInje => "PT_INJE",
            ChannelId::PtComb => "PT_COMB",
            ChannelId::Tc1 => "TC1",
            ChannelId::Tc2 => "TC2",
            ChannelId::Tc3 => "TC3",
        }
    }
}

impl MessageType {
    /// Decode a wire code.
    pub fn from_u8(code: u8) -> Result<Self> {
        let msg = match code {
            1 => MessageType::AckValue,
            2 => MessageType::Payload,
            3 => MessageType::Text,
            4 => MessageType::UnsetValve,
            5 => MessageType::SetValve,
            6 => MessageType::UnsetIgnition,
            7 => MessageType::SetIgnition,
            8 => MessageType::NormIgnite,
            9 => MessageType::LcMainSend,
            10 => MessageType::Lc1Send,
            11 => MessageType::Lc2Send,
            12 => MessageType::Lc3Send,
            13 => MessageType::PtFeedSend,
            14 => MessageType::PtInjeSend,
            15 => MessageType::PtCombSend,
            16 => MessageType::Tc1Send,
            17 => MessageType::Tc2Send,
            18 => MessageType::Tc3Send,
            19 => MessageType::SetPvalve,
            20 => MessageType::UnsetPvalve,
            21 => MessageType::SetGitvc,
            22 => MessageType::UnsetGitvc,
            23 => MessageType::LeakCheck,
            24 => MessageType::Fill,
            25 => MessageType::FillIdle,
            26 => MessageType::Default,
            other => return Err(WireError::UnknownMessageType(other)),
        };
        Ok(msg)
    }

    /// The wire code for this message.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// The firmware's name for this message.
    pub fn name(self) -> &'static str {
        match self {
            MessageType::AckValue => "ACK_VALUE",
            MessageType::Payload => "PAYLOAD",
            MessageType::Text => "TEXT",
            MessageType::UnsetValve => "UNSET_VALVE",
            MessageType::SetValve => "SET_VALVE",
            MessageType::UnsetIgnition => "UNSET_IGNITION",
            MessageType::SetIgnition => "SET_IGNITION",
            MessageType::NormIgnite => "NORM_IGNITE",
            MessageType::LcMainSend => "LC_MAIN_SEND",
            MessageType::Lc1Send => "LC1_SEND",
            MessageType::Lc2Send => "LC2_SEND",
            MessageType::Lc3Send => "LC3_SEND",
            MessageType::PtFeedSend => "PT_FEED_SEND",
            MessageType::PtInjeSend => "PT_INJE_SEND",
            MessageType::PtCombSend => "PT_COMB_SEND",
            MessageType::Tc1Send => "TC1_SEND",
            MessageType::Tc2Send => "TC2_SEND",
            MessageType::Tc3Send => "TC3_SEND",
            MessageType::SetPvalve => "SET_PVALVE",
            MessageType::UnsetPvalve => "UNSET_PVALVE",
            MessageType::SetGitvc => "SET_GITVC",
            MessageType::UnsetGitvc => "UNSET_GITVC",
            MessageType::LeakCheck => "LEAK_CHECK",
            MessageType::Fill => "FILL",
            MessageType::FillIdle => "FILL_IDLE",
            MessageType::Default => "DEFAULT",
        }
    }

    /// Parse a firmware name, case-insensitively. Useful when an operator
    /// console maps configured strings to command codes.
    pub fn from_name(name: &str) -> Option<Self> {
        (1..=26u8)
            .map(|code| MessageType::from_u8(code).unwrap())
            .find(|msg| msg.name().eq_ignore_ascii_case(name))
    }

    /// The physical channel this message carries samples for, if it is one
    /// of the payload-per-channel codes.
    pub fn channel(self) -> Option<ChannelId> {
        let channel = match self {
            MessageType::LcMainSend => ChannelId::LcMain,
            MessageType::Lc1Send => ChannelId::Lc1,
            MessageType::Lc2Send => ChannelId::Lc2,
            MessageType::Lc3Send => ChannelId::Lc3,
            MessageType::PtFeedSend => ChannelId::PtFeed,
            MessageType::PtInjeSend => ChannelId::PtInje,
            MessageType::PtCombSend => ChannelId::PtComb,
            MessageType::Tc1Send => ChannelId::Tc1,
            MessageType::Tc2Send => ChannelId::Tc2,
            MessageType::Tc3Send => ChannelId::Tc3,
            _ => return None,
        };
        Some(channel)
    }

    /// Whether this is one of the actuator/command codes sent upstream.
    pub fn is_command(self) -> bool {
        matches!(
            self,
            MessageType::UnsetValve
                | MessageType::SetValve
                | MessageType::UnsetIgnition
                | MessageType::SetIgnition
                | MessageType::NormIgnite
                | MessageType::SetPvalve
                | MessageType::UnsetPvalve
                | MessageType::SetGitvc
                | MessageType::UnsetGitvc
                | MessageType::LeakCheck
                | MessageType::Fill
                | MessageType::FillIdle
                | MessageType::Default
        )
    }
}
