//! # Action Scripts
//!
//! The JSON surface an off-chain caller submits through. A script is an
//! object naming the operator identity plus an ordered list of actions, one
//! per transaction:
//!
//! ```json
//! {
//!   "operator": "0xf39f...2266",
//!   "actions": [
//!     { "op": "register_project", "caller": "0xf39f...2266",
//!       "name": "Mangrove-1", "owner": "0x7099...79c8",
//!       "estimated_credits": 1000 },
//!     { "op": "mint", "caller": "0xf39f...2266", "to": "0x7099...79c8",
//!       "amount": 500, "project_id": 1 }
//!   ]
//! }
//! ```
//!
//! Applying an action yields the transaction receipt plus, where the action
//! creates an entity, the assigned id. Rejections surface as errors with the
//! engine's message; the engine guarantees a rejected action changed
//! nothing, so a script can safely continue past one (`--keep-going`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use canopy_core::SettlementEngine;

/// A whole script file: the operator the engine is constructed with, then
/// the actions applied in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    /// The privileged operator identity.
    pub operator: String,
    /// Transactions to apply, in order.
    pub actions: Vec<Action>,
}

/// One transaction against the settlement core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    RegisterProject {
        caller: String,
        name: String,
        owner: String,
        estimated_credits: u64,
    },
    DeactivateProject {
        caller: String,
        project_id: u64,
    },
    Mint {
        caller: String,
        to: String,
        amount: u64,
        project_id: u64,
    },
    Transfer {
        caller: String,
        to: String,
        amount: u64,
        project_id: u64,
    },
    OperatorTransfer {
        caller: String,
        from: String,
        to: String,
        amount: u64,
        project_id: u64,
    },
    Retire {
        caller: String,
        amount: u64,
        project_id: u64,
    },
    CreateTender {
        caller: String,
        title: String,
        #[serde(default)]
        description: String,
        credits_required: u64,
        max_price_per_credit: u64,
        duration_days: u64,
    },
    SubmitProposal {
        caller: String,
        tender_id: u64,
        credits_offered: u64,
        price_per_credit: u64,
        project_id: u64,
        #[serde(default)]
        description: String,
    },
    AwardTender {
        caller: String,
        tender_id: u64,
        proposal_id: u64,
        payment: u64,
    },
    CancelTender {
        caller: String,
        tender_id: u64,
    },
    CreateListing {
        caller: String,
        project_id: u64,
        amount: u64,
        price_per_credit: u64,
    },
    Purchase {
        caller: String,
        listing_id: u64,
        amount: u64,
        payment: u64,
    },
    PurchaseDirect {
        caller: String,
        project_id: u64,
        payment: u64,
    },
    SetFee {
        caller: String,
        bps: u32,
    },
    SetPrice {
        caller: String,
        price: u64,
    },
    WithdrawFees {
        caller: String,
    },
    Pause {
        caller: String,
    },
    Unpause {
        caller: String,
    },
}

impl Action {
    /// Short label for logging.
    pub fn op_name(&self) -> &'static str {
        match self {
            Action::RegisterProject { .. } => "register_project",
            Action::DeactivateProject { .. } => "deactivate_project",
            Action::Mint { .. } => "mint",
            Action::Transfer { .. } => "transfer",
            Action::OperatorTransfer { .. } => "operator_transfer",
            Action::Retire { .. } => "retire",
            Action::CreateTender { .. } => "create_tender",
            Action::SubmitProposal { .. } => "submit_proposal",
            Action::AwardTender { .. } => "award_tender",
            Action::CancelTender { .. } => "cancel_tender",
            Action::CreateListing { .. } => "create_listing",
            Action::Purchase { .. } => "purchase",
            Action::PurchaseDirect { .. } => "purchase_direct",
            Action::SetFee { .. } => "set_fee",
            Action::SetPrice { .. } => "set_price",
            Action::WithdrawFees { .. } => "withdraw_fees",
            Action::Pause { .. } => "pause",
            Action::Unpause { .. } => "unpause",
        }
    }
}

/// Parses a script from JSON text.
pub fn parse_script(text: &str) -> Result<Script> {
    serde_json::from_str(text).context("failed to parse action script")
}

/// Applies one action and returns the printable outcome: the receipt plus
/// any id the action created.
pub fn apply_action(engine: &mut SettlementEngine, action: &Action) -> Result<serde_json::Value> {
    let outcome = match action {
        Action::RegisterProject {
            caller,
            name,
            owner,
            estimated_credits,
        } => {
            let (project_id, receipt) =
                engine.register_project(caller, name, owner, *estimated_credits)?;
            json!({ "op": action.op_name(), "project_id": project_id, "receipt": receipt })
        }
        Action::DeactivateProject { caller, project_id } => {
            let receipt = engine.deactivate_project(caller, *project_id)?;
            json!({ "op": action.op_name(), "receipt": receipt })
        }
        Action::Mint {
            caller,
            to,
            amount,
            project_id,
        } => {
            let receipt = engine.mint(caller, to, *amount, *project_id)?;
            json!({ "op": action.op_name(), "receipt": receipt })
        }
        Action::Transfer {
            caller,
            to,
            amount,
            project_id,
        } => {
            let receipt = engine.transfer_scoped(caller, to, *amount, *project_id)?;
            json!({ "op": action.op_name(), "receipt": receipt })
        }
        Action::OperatorTransfer {
            caller,
            from,
            to,
            amount,
            project_id,
        } => {
            let receipt =
                engine.transfer_scoped_as_operator(caller, from, to, *amount, *project_id)?;
            json!({ "op": action.op_name(), "receipt": receipt })
        }
        Action::Retire {
            caller,
            amount,
            project_id,
        } => {
            let receipt = engine.retire(caller, *amount, *project_id)?;
            json!({ "op": action.op_name(), "receipt": receipt })
        }
        Action::CreateTender {
            caller,
            title,
            description,
            credits_required,
            max_price_per_credit,
            duration_days,
        } => {
            let (tender_id, receipt) = engine.create_tender(
                caller,
                title,
                description,
                *credits_required,
                *max_price_per_credit,
                *duration_days,
            )?;
            json!({ "op": action.op_name(), "tender_id": tender_id, "receipt": receipt })
        }
        Action::SubmitProposal {
            caller,
            tender_id,
            credits_offered,
            price_per_credit,
            project_id,
            description,
        } => {
            let (proposal_id, receipt) = engine.submit_proposal(
                caller,
                *tender_id,
                *credits_offered,
                *price_per_credit,
                *project_id,
                description,
            )?;
            json!({ "op": action.op_name(), "proposal_id": proposal_id, "receipt": receipt })
        }
        Action::AwardTender {
            caller,
            tender_id,
            proposal_id,
            payment,
        } => {
            let receipt = engine.award_tender(caller, *tender_id, *proposal_id, *payment)?;
            json!({ "op": action.op_name(), "receipt": receipt })
        }
        Action::CancelTender { caller, tender_id } => {
            let receipt = engine.cancel_tender(caller, *tender_id)?;
            json!({ "op": action.op_name(), "receipt": receipt })
        }
        Action::CreateListing {
            caller,
            project_id,
            amount,
            price_per_credit,
        } => {
            let (listing_id, receipt) =
                engine.create_listing(caller, *project_id, *amount, *price_per_credit)?;
            json!({ "op": action.op_name(), "listing_id": listing_id, "receipt": receipt })
        }
        Action::Purchase {
            caller,
            listing_id,
            amount,
            payment,
        } => {
            let receipt = engine.purchase(caller, *listing_id, *amount, *payment)?;
            json!({ "op": action.op_name(), "receipt": receipt })
        }
        Action::PurchaseDirect {
            caller,
            project_id,
            payment,
        } => {
            let (credits, receipt) = engine.purchase_direct(caller, *project_id, *payment)?;
            json!({ "op": action.op_name(), "credits_minted": credits, "receipt": receipt })
        }
        Action::SetFee { caller, bps } => {
            let receipt = engine.set_fee_bps(caller, *bps)?;
            json!({ "op": action.op_name(), "receipt": receipt })
        }
        Action::SetPrice { caller, price } => {
            let receipt = engine.set_credit_price(caller, *price)?;
            json!({ "op": action.op_name(), "receipt": receipt })
        }
        Action::WithdrawFees { caller } => {
            let receipt = engine.withdraw_fees(caller)?;
            json!({ "op": action.op_name(), "receipt": receipt })
        }
        Action::Pause { caller } => {
            let receipt = engine.pause(caller)?;
            json!({ "op": action.op_name(), "receipt": receipt })
        }
        Action::Unpause { caller } => {
            let receipt = engine.unpause(caller)?;
            json!({ "op": action.op_name(), "receipt": receipt })
        }
    };
    Ok(outcome)
}
