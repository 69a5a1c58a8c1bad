//! WT16 register map
//!
//! The static table of every register the poll cycle reads. Addresses and
//! classes match the controller firmware and must not be changed. The table
//! order is the poll order: discrete inputs, input registers, holding
//! registers, wide counters, then the fault message block.

use crate::codec::{Scale, TEXT_REGISTER_COUNT};
use crate::protocol::ModbusFunction;

/// Register class, which decides function code and register count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    /// Single bit, FC02
    Discrete,
    /// Read-only measurement, FC04
    Input,
    /// Read/write setpoint, FC03
    Holding,
    /// 32-bit counter over two input registers
    Wide,
    /// Fault message over sixteen input registers
    Text,
}

impl RegisterClass {
    pub fn function(self) -> ModbusFunction {
        match self {
            RegisterClass::Discrete => ModbusFunction::ReadDiscreteInputs,
            RegisterClass::Holding => ModbusFunction::ReadHoldingRegisters,
            RegisterClass::Input | RegisterClass::Wide | RegisterClass::Text => {
                ModbusFunction::ReadInputRegisters
            }
        }
    }

    /// Number of bits or registers read for one entry
    pub fn count(self) -> u16 {
        match self {
            RegisterClass::Discrete | RegisterClass::Input | RegisterClass::Holding => 1,
            RegisterClass::Wide => 2,
            RegisterClass::Text => TEXT_REGISTER_COUNT as u16,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RegisterClass::Discrete => "discrete",
            RegisterClass::Input => "input",
            RegisterClass::Holding => "holding",
            RegisterClass::Wide => "wide",
            RegisterClass::Text => "text",
        }
    }
}

/// One entry of the register map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSpec {
    pub address: u16,
    /// Snapshot key
    pub key: &'static str,
    pub class: RegisterClass,
    pub scale: Scale,
    /// Apply the 16-bit two's-complement reading
    pub signed: bool,
    /// Display name
    pub label: &'static str,
    pub unit: Option<&'static str>,
}

impl RegisterSpec {
    const fn discrete(address: u16, key: &'static str, label: &'static str) -> Self {
        Self {
            address,
            key,
            class: RegisterClass::Discrete,
            scale: Scale::One,
            signed: false,
            label,
            unit: None,
        }
    }

    /// Signed tenth-degree temperature
    const fn temperature(
        class: RegisterClass,
        address: u16,
        key: &'static str,
        label: &'static str,
    ) -> Self {
        Self {
            address,
            key,
            class,
            scale: Scale::Tenth,
            signed: true,
            label,
            unit: Some("°C"),
        }
    }

    const fn input(
        address: u16,
        key: &'static str,
        label: &'static str,
        scale: Scale,
        signed: bool,
        unit: Option<&'static str>,
    ) -> Self {
        Self {
            address,
            key,
            class: RegisterClass::Input,
            scale,
            signed,
            label,
            unit,
        }
    }

    const fn wide(address: u16, key: &'static str, label: &'static str) -> Self {
        Self {
            address,
            key,
            class: RegisterClass::Wide,
            scale: Scale::One,
            signed: false,
            label,
            unit: Some("min"),
        }
    }

    pub fn function(&self) -> ModbusFunction {
        self.class.function()
    }

    pub fn count(&self) -> u16 {
        self.class.count()
    }
}

use self::RegisterClass::{Holding, Input};

/// Every register read by one poll cycle, in poll order.
pub static REGISTER_MAP: &[RegisterSpec] = &[
    // Discrete inputs
    RegisterSpec::discrete(45, "stroemungswaechter_wp1", "Strömungswächter WP1"),
    RegisterSpec::discrete(679, "verdichter_wp1", "Verdichter WP1"),
    RegisterSpec::discrete(680, "up_heizen_wp1", "UP-Heizen WP1"),
    RegisterSpec::discrete(681, "up_sole_wasser_wp1", "UP-Sole/Wasser WP1"),
    RegisterSpec::discrete(682, "up_mischer_1", "UP-Mischer 1"),
    RegisterSpec::discrete(685, "up_warmwasser", "UP-Warmwasser"),
    RegisterSpec::discrete(686, "fernstoerung", "Fernstörung"),
    RegisterSpec::discrete(703, "sperre_warmwasser", "Sperre Warmwasser"),
    RegisterSpec::discrete(704, "sperre_heizen", "Sperre Heizen"),
    RegisterSpec::discrete(705, "evu_sperre", "EVU-Sperre"),
    RegisterSpec::discrete(706, "sgready_1", "SGready 1"),
    RegisterSpec::discrete(707, "sgready_2", "SGready 2"),
    // Input registers
    RegisterSpec::temperature(Input, 12, "raum_ist_temperatur", "Raum Ist-Temperatur"),
    RegisterSpec::temperature(Input, 13, "warmwasser_ist_temperatur", "Warmwasser Ist-Temperatur"),
    RegisterSpec::temperature(Input, 14, "vorlauf_soll_temperatur", "Vorlauf Soll-Temperatur"),
    RegisterSpec::temperature(Input, 15, "aussentemperatur", "Außentemperatur"),
    RegisterSpec::temperature(Input, 16, "puffer_ist_temperatur", "Puffer Ist-Temperatur"),
    RegisterSpec::temperature(Input, 17, "mischer_ist_temperatur", "Mischer Ist-Temperatur"),
    RegisterSpec::temperature(Input, 18, "reservefuehler_1_temperatur", "Reservefühler 1 Temperatur"),
    RegisterSpec::temperature(Input, 19, "reservefuehler_2_temperatur", "Reservefühler 2 Temperatur"),
    RegisterSpec::temperature(Input, 20, "reservefuehler_3_temperatur", "Reservefühler 3 Temperatur"),
    RegisterSpec::temperature(Input, 21, "abtaufuehler_ist_temperatur", "Abtaufühler Ist-Temperatur"),
    RegisterSpec::temperature(Input, 25, "wp1_vorlauf_ist_temperatur", "WP1 Vorlauf Ist-Temperatur"),
    RegisterSpec::temperature(Input, 26, "wp1_ruecklauf_ist_temperatur", "WP1 Rücklauf Ist-Temperatur"),
    RegisterSpec::temperature(Input, 27, "wp1_quelle_eintritt_temperatur", "WP1 Quelle Eintritt Temperatur"),
    RegisterSpec::temperature(Input, 28, "wp1_quelle_austritt_temperatur", "WP1 Quelle Austritt Temperatur"),
    RegisterSpec::temperature(Input, 29, "wp1_ueberhitzung", "WP1 Überhitzung"),
    RegisterSpec::temperature(Input, 31, "wp1_verdampfungstemperatur", "WP1 Verdampfungstemperatur"),
    RegisterSpec::temperature(Input, 33, "wp1_verfluessigungstemperatur", "WP1 Verflüssigungstemperatur"),
    RegisterSpec::temperature(Input, 35, "wp1_verdampfer_temperatur", "WP1 Verdampfer Temperatur"),
    RegisterSpec::temperature(Input, 36, "wp1_sauggas_temperatur", "WP1 Sauggas Temperatur"),
    RegisterSpec::temperature(Input, 37, "wp1_heissgas_temperatur", "WP1 Heißgas Temperatur"),
    RegisterSpec::temperature(Input, 38, "wp1_sauggas_evi_temperatur", "WP1 Sauggas EVI Temperatur"),
    RegisterSpec::temperature(Input, 40, "wp1_verdampfungstemperatur_evi", "WP1 Verdampfungstemperatur EVI"),
    RegisterSpec::temperature(Input, 42, "wp1_verfluessigungstemperatur_evi", "WP1 Verflüssigungstemperatur EVI"),
    RegisterSpec::input(43, "wp1_verfluessigungsdruck_evi", "WP1 Verflüssigungsdruck EVI", Scale::Hundredth, true, Some("bar")),
    RegisterSpec::input(44, "wp1_volumenstrom", "WP1 Volumenstrom", Scale::One, false, Some("L/min")),
    RegisterSpec::temperature(Input, 46, "wp1_ueberhitzung_evi", "WP1 Überhitzung EVI"),
    RegisterSpec::temperature(Input, 726, "mlt1_vorlauf_soll_temperatur", "MLT1 Vorlauf Soll-Temperatur"),
    RegisterSpec::temperature(Input, 727, "mlt1_vorlauf_ist_temperatur", "MLT1 Vorlauf Ist-Temperatur"),
    RegisterSpec::input(736, "mlt1_mischerposition", "MLT1 Mischerposition", Scale::One, false, Some("s")),
    RegisterSpec::input(1008, "aktuelle_schritte_cl1", "Aktuelle Schritte CL1", Scale::One, false, None),
    RegisterSpec::input(1048, "aktuelle_schritte_cl2", "Aktuelle Schritte CL2", Scale::One, false, None),
    // Holding registers
    RegisterSpec::temperature(Holding, 1, "warmwasser_soll_temperatur", "Warmwasser-Soll-Temperatur"),
    RegisterSpec::temperature(Holding, 723, "raum_soll_temperatur", "Raum-Soll-Temperatur"),
    // Run-time counters
    RegisterSpec::wide(60164, "wp1_letzte_laufzeit_pumpe", "WP1 Letzte Laufzeit Pumpe"),
    RegisterSpec::wide(60168, "wp1_letzte_laufzeit_warmwasser", "WP1 Letzte Laufzeit Warmwasser"),
    // Fault message
    RegisterSpec {
        address: 63000,
        key: "aktive_fehlermeldung",
        class: RegisterClass::Text,
        scale: Scale::One,
        signed: false,
        label: "Aktive Fehlermeldung",
        unit: None,
    },
];

/// Look up a register by snapshot key.
pub fn by_key(key: &str) -> Option<&'static RegisterSpec> {
    REGISTER_MAP.iter().find(|spec| spec.key == key)
}

/// Look up a register by class and address.
pub fn by_address(class: RegisterClass, address: u16) -> Option<&'static RegisterSpec> {
    REGISTER_MAP
        .iter()
        .find(|spec| spec.class == class && spec.address == address)
}

/// Registers of one class, in poll order.
pub fn of_class(class: RegisterClass) -> impl Iterator<Item = &'static RegisterSpec> {
    REGISTER_MAP.iter().filter(move |spec| spec.class == class)
}
