//! Operational phases and their static document requirements.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use clearway_core::DomainError;

/// Document type code accepted in every phase.
pub const OTHER_DOCUMENT: &str = "outro";

/// Ordered clearance phases. A shipment only ever advances to the immediate
/// next phase.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    ColetaDispersa,
    Legalizacao,
    Alfandegas,
    Cornelder,
    Taxacao,
    Facturacao,
    Pod,
}

/// Required and optional document type codes for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseRequirements {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

const REQUIREMENTS: [PhaseRequirements; 7] = [
    PhaseRequirements {
        required: &["bill_of_lading", "commercial_invoice", "packing_list"],
        optional: &["certificate_of_origin"],
    },
    PhaseRequirements {
        required: &["endorsed_bill_of_lading", "import_license"],
        optional: &["phytosanitary_certificate", "power_of_attorney"],
    },
    PhaseRequirements {
        required: &["customs_declaration", "cargo_manifest", "duty_assessment"],
        optional: &["inspection_report"],
    },
    PhaseRequirements {
        required: &["port_release_order", "storage_invoice"],
        optional: &["gate_pass"],
    },
    PhaseRequirements {
        required: &["tax_notice", "tax_payment_proof"],
        optional: &[],
    },
    PhaseRequirements {
        required: &["client_invoice"],
        optional: &["expense_summary"],
    },
    PhaseRequirements {
        required: &["proof_of_delivery"],
        optional: &["delivery_photos"],
    },
];

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::ColetaDispersa,
        Phase::Legalizacao,
        Phase::Alfandegas,
        Phase::Cornelder,
        Phase::Taxacao,
        Phase::Facturacao,
        Phase::Pod,
    ];

    pub const FIRST: Phase = Phase::ColetaDispersa;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Phase> {
        Phase::ALL.get(self.index() + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::ColetaDispersa => "coleta_dispersa",
            Phase::Legalizacao => "legalizacao",
            Phase::Alfandegas => "alfandegas",
            Phase::Cornelder => "cornelder",
            Phase::Taxacao => "taxacao",
            Phase::Facturacao => "facturacao",
            Phase::Pod => "pod",
        }
    }

    pub fn requirements(self) -> &'static PhaseRequirements {
        &REQUIREMENTS[self.index()]
    }

    pub fn required_documents(self) -> &'static [&'static str] {
        self.requirements().required
    }

    /// Whether `code` may be attached in this phase (required, optional or `outro`).
    pub fn accepts_document(self, code: &str) -> bool {
        let reqs = self.requirements();
        code == OTHER_DOCUMENT || reqs.required.contains(&code) || reqs.optional.contains(&code)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown phase `{s}`")))
    }
}
