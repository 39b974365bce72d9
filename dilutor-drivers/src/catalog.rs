//! Labware and pipette definitions
//!
//! A small built-in catalog of the definitions the protocol uses. Lookups
//! are by the same names the deck configuration uses.

/// What a piece of labware is for
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LabwareKind {
    /// 96-well plate, capacity per well (µL)
    Plate { well_capacity_ul: f64 },
    /// 96-tip rack, volume per tip (µL)
    TipRack { tip_volume_ul: f64 },
}

/// Catalog entry for a labware definition
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LabwareModel {
    pub name: &'static str,
    pub kind: LabwareKind,
}

impl LabwareModel {
    const fn plate(name: &'static str, well_capacity_ul: f64) -> Self {
        Self {
            name,
            kind: LabwareKind::Plate { well_capacity_ul },
        }
    }

    const fn tip_rack(name: &'static str, tip_volume_ul: f64) -> Self {
        Self {
            name,
            kind: LabwareKind::TipRack { tip_volume_ul },
        }
    }

    /// Look up a labware definition by name
    pub fn lookup(name: &str) -> Option<Self> {
        LABWARE.iter().find(|m| m.name == name).copied()
    }

    pub fn is_tip_rack(&self) -> bool {
        matches!(self.kind, LabwareKind::TipRack { .. })
    }
}

/// Known labware definitions
pub const LABWARE: &[LabwareModel] = &[
    LabwareModel::plate("corning_96_wellplate_360ul_flat", 360.0),
    LabwareModel::plate("nest_96_wellplate_200ul_flat", 200.0),
    LabwareModel::plate("nest_96_wellplate_2ml_deep", 2000.0),
    LabwareModel::plate("usascientific_96_wellplate_2.4ml_deep", 2400.0),
    LabwareModel::tip_rack("opentrons_96_tiprack_10ul", 10.0),
    LabwareModel::tip_rack("opentrons_96_tiprack_20ul", 20.0),
    LabwareModel::tip_rack("opentrons_96_filtertiprack_20ul", 20.0),
    LabwareModel::tip_rack("opentrons_96_tiprack_300ul", 300.0),
    LabwareModel::tip_rack("opentrons_96_tiprack_1000ul", 1000.0),
];

/// Catalog entry for a single-channel pipette
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PipetteModel {
    pub name: &'static str,
    /// Smallest accurate volume (µL)
    pub min_volume_ul: f64,
    /// Largest volume per aspirate (µL)
    pub max_volume_ul: f64,
}

impl PipetteModel {
    const fn new(name: &'static str, min_volume_ul: f64, max_volume_ul: f64) -> Self {
        Self {
            name,
            min_volume_ul,
            max_volume_ul,
        }
    }

    /// Look up a pipette definition by name
    pub fn lookup(name: &str) -> Option<Self> {
        PIPETTES.iter().find(|m| m.name == name).copied()
    }

    /// Number of equal aspirate/dispense cycles needed for a volume
    pub fn cycles_for(&self, volume_ul: f64) -> u32 {
        let mut cycles = 1u32;
        while volume_ul / cycles as f64 > self.max_volume_ul {
            cycles += 1;
        }
        cycles
    }
}

/// Known pipette definitions
pub const PIPETTES: &[PipetteModel] = &[
    PipetteModel::new("p10_single", 1.0, 10.0),
    PipetteModel::new("p300_single", 30.0, 300.0),
    PipetteModel::new("p20_single_gen2", 1.0, 20.0),
    PipetteModel::new("p300_single_gen2", 20.0, 300.0),
    PipetteModel::new("p1000_single_gen2", 100.0, 1000.0),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_default_deck() {
        let plate = LabwareModel::lookup("corning_96_wellplate_360ul_flat").unwrap();
        assert_eq!(
            plate.kind,
            LabwareKind::Plate {
                well_capacity_ul: 360.0
            }
        );
        assert!(LabwareModel::lookup("opentrons_96_tiprack_20ul")
            .unwrap()
            .is_tip_rack());
        assert!(LabwareModel::lookup("mystery_plate").is_none());
    }

    #[test]
    fn test_pipette_ranges() {
        let p10 = PipetteModel::lookup("p10_single").unwrap();
        assert_eq!((p10.min_volume_ul, p10.max_volume_ul), (1.0, 10.0));
        let p300 = PipetteModel::lookup("p300_single").unwrap();
        assert_eq!(p300.min_volume_ul, 30.0);
        assert!(PipetteModel::lookup("p50_multi").is_none());
    }

    #[test]
    fn test_cycles_for() {
        let p10 = PipetteModel::lookup("p10_single").unwrap();
        assert_eq!(p10.cycles_for(7.5), 1);
        assert_eq!(p10.cycles_for(10.0), 1);
        assert_eq!(p10.cycles_for(15.0), 2);
        assert_eq!(p10.cycles_for(30.0), 3);
        assert_eq!(p10.cycles_for(30.5), 4);
    }
}
