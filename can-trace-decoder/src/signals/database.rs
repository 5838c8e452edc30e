//! Signal database
//!
//! Combines message definitions from one or more DBC files into a single
//! queryable dictionary. The database is built once and then shared read-only.

use super::dictionary::{DecodeError, MessageDescriptor, SignalDictionary};
use crate::message_decoder::MessageDecoder;
use crate::types::{Result, SignalMap};
use std::collections::HashMap;
use std::path::Path;

/// A complete CAN message definition
#[derive(Debug, Clone)]
pub struct MessageDefinition {
    /// CAN message ID
    pub id: u32,
    /// Message name
    pub name: String,
    /// Message size in bytes
    pub size: usize,
    /// Sender ECU name (optional)
    pub sender: Option<String>,
    /// All signals in this message
    pub signals: Vec<SignalDefinition>,
    /// Multiplexer signal name (if multiplexed)
    pub multiplexer_signal: Option<String>,
    /// Source file (DBC filename)
    pub source: String,
}

impl MessageDefinition {
    pub fn is_multiplexed(&self) -> bool {
        self.multiplexer_signal.is_some()
            || self.signals.iter().any(|s| s.multiplexer_info.is_some())
    }
}

impl MessageDescriptor for MessageDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn decode(&self, payload: &[u8]) -> std::result::Result<SignalMap, DecodeError> {
        MessageDecoder::decode_message(payload, self)
    }
}

/// A CAN signal definition
#[derive(Debug, Clone)]
pub struct SignalDefinition {
    /// Signal name
    pub name: String,
    /// Start bit in the CAN frame (DBC numbering)
    pub start_bit: u16,
    /// Length in bits
    pub length: u16,
    pub byte_order: ByteOrder,
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Engineering unit (e.g., "%", "kW", "V")
    pub unit: Option<String>,
    /// Multiplexer info (None if not multiplexed)
    pub multiplexer_info: Option<MultiplexerInfo>,
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Signed,
    Unsigned,
}

/// Multiplexer information for multiplexed signals
#[derive(Debug, Clone)]
pub struct MultiplexerInfo {
    /// Name of the multiplexer signal that controls this signal
    pub multiplexer_signal: String,
    /// Multiplexer value(s) for which this signal is active
    pub multiplexer_values: Vec<u64>,
}

/// A signal whose name matched a keyword search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalMatch {
    pub can_id: u32,
    pub message_name: String,
    pub signal_name: String,
}

/// The unified signal database
#[derive(Debug, Default)]
pub struct SignalDatabase {
    /// Message definitions by CAN ID (first definition wins)
    messages: HashMap<u32, MessageDefinition>,

    /// Signal name lookup: signal name -> CAN IDs carrying it
    signal_lookup: HashMap<String, Vec<u32>>,
}

impl SignalDatabase {
    /// Create a new empty signal database
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a DBC file into a fresh database
    ///
    /// Any read or parse problem is a [`crate::DecoderError::DictionaryLoad`].
    pub fn load(path: &Path) -> Result<Self> {
        let mut db = Self::new();
        db.add_dbc(path)?;
        Ok(db)
    }

    /// Load a DBC file and add its definitions to the database
    pub fn add_dbc(&mut self, path: &Path) -> Result<()> {
        log::info!("Loading DBC file: {:?}", path);

        let messages = super::dbc::parse_dbc_file(path)?;
        for message in messages {
            self.add_message(message);
        }

        log::info!("DBC file loaded successfully: {:?}", path);
        Ok(())
    }

    /// Add a message definition to the database
    pub fn add_message(&mut self, message: MessageDefinition) {
        let can_id = message.id;

        if let Some(existing) = self.messages.get(&can_id) {
            log::warn!(
                "Duplicate definition for CAN ID 0x{:X}: keeping '{}' from {}, ignoring '{}' from {}",
                can_id,
                existing.name,
                existing.source,
                message.name,
                message.source
            );
            return;
        }

        for signal in &message.signals {
            self.signal_lookup
                .entry(signal.name.clone())
                .or_default()
                .push(can_id);
        }

        self.messages.insert(can_id, message);
    }

    /// Get the message definition for a given CAN ID
    pub fn get_message(&self, can_id: u32) -> Option<&MessageDefinition> {
        self.messages.get(&can_id)
    }

    /// Find all messages containing a specific signal name
    pub fn find_signal(&self, signal_name: &str) -> Vec<(u32, &SignalDefinition)> {
        self.signal_lookup
            .get(signal_name)
            .map(|ids| {
                ids.iter()
                    .filter_map(|can_id| {
                        self.get_message(*can_id)
                            .and_then(|msg| msg.signals.iter().find(|s| s.name == signal_name))
                            .map(|sig| (*can_id, sig))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Case-insensitive substring search over signal names
    ///
    /// Results are ordered by CAN ID, then by signal position in the message.
    pub fn find_signals(&self, keywords: &[&str]) -> Vec<SignalMatch> {
        let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

        let mut matches = Vec::new();
        for can_id in self.get_all_can_ids() {
            let Some(message) = self.messages.get(&can_id) else {
                continue;
            };
            for signal in &message.signals {
                let name = signal.name.to_lowercase();
                if keywords.iter().any(|k| name.contains(k.as_str())) {
                    matches.push(SignalMatch {
                        can_id,
                        message_name: message.name.clone(),
                        signal_name: signal.name.clone(),
                    });
                }
            }
        }
        matches
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            num_messages: self.messages.len(),
            num_signals: self.messages.values().map(|msg| msg.signals.len()).sum(),
        }
    }

    /// Get all unique CAN IDs in the database
    pub fn get_all_can_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.messages.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl SignalDictionary for SignalDatabase {
    type Message = MessageDefinition;

    fn lookup(&self, can_id: u32) -> std::result::Result<&MessageDefinition, DecodeError> {
        self.messages
            .get(&can_id)
            .ok_or(DecodeError::UnknownIdentifier(can_id))
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soc_message() -> MessageDefinition {
        let signal = |name: &str, start_bit: u16| SignalDefinition {
            name: name.to_string(),
            start_bit,
            length: 8,
            byte_order: ByteOrder::LittleEndian,
            value_type: ValueType::Unsigned,
            factor: 0.5,
            offset: 0.0,
            unit: Some("%".to_string()),
            multiplexer_info: None,
        };

        MessageDefinition {
            id: 0x292,
            name: "ID292BMS_SOC".to_string(),
            size: 8,
            sender: Some("BMS".to_string()),
            signals: vec![
                signal("SOCmin292", 0),
                signal("SOCUI292", 8),
                signal("SOCmax292", 16),
                signal("SOCave292", 24),
            ],
            multiplexer_signal: None,
            source: "test.dbc".to_string(),
        }
    }

    #[test]
    fn test_empty_database() {
        let db = SignalDatabase::new();
        let stats = db.stats();
        assert_eq!(stats.num_messages, 0);
        assert_eq!(stats.num_signals, 0);
        assert_eq!(
            db.lookup(0x292).unwrap_err(),
            DecodeError::UnknownIdentifier(0x292)
        );
    }

    #[test]
    fn test_add_message() {
        let mut db = SignalDatabase::new();
        db.add_message(soc_message());

        let stats = db.stats();
        assert_eq!(stats.num_messages, 1);
        assert_eq!(stats.num_signals, 4);

        let msg = db.get_message(0x292).unwrap();
        assert_eq!(msg.name, "ID292BMS_SOC");
        assert!(!msg.is_multiplexed());

        let found = db.find_signal("SOCmax292");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, 0x292);
        assert_eq!(found[0].1.start_bit, 16);
    }

    #[test]
    fn test_duplicate_id_keeps_first() {
        let mut db = SignalDatabase::new();
        db.add_message(soc_message());
        let mut other = soc_message();
        other.name = "Other".to_string();
        db.add_message(other);

        assert_eq!(db.stats().num_messages, 1);
        assert_eq!(db.get_message(0x292).unwrap().name, "ID292BMS_SOC");
        assert_eq!(db.find_signal("SOCave292").len(), 1);
    }

    #[test]
    fn test_dictionary_decode() {
        let mut db = SignalDatabase::new();
        db.add_message(soc_message());

        let values = db
            .decode(0x292, &[0x0A, 0x1E, 0x28, 0x64, 0x00, 0x00, 0x00, 0xFF])
            .unwrap();
        assert_eq!(values["SOCmin292"], 5.0);
        assert_eq!(values["SOCUI292"], 15.0);
        assert_eq!(values["SOCmax292"], 20.0);
        assert_eq!(values["SOCave292"], 50.0);
        assert_eq!(db.lookup(0x292).unwrap().name(), "ID292BMS_SOC");
    }

    #[test]
    fn test_keyword_search() {
        let mut db = SignalDatabase::new();
        db.add_message(soc_message());

        let matches = db.find_signals(&["soc", "Charge"]);
        assert_eq!(matches.len(), 4);
        assert_eq!(matches[0].signal_name, "SOCmin292");
        assert_eq!(matches[0].message_name, "ID292BMS_SOC");
        assert!(db.find_signals(&["battery"]).is_empty());
    }
}
