use serde::Deserialize;

/// Month/year selector used by payroll, expenses and ledger listings.
#[derive(Debug, Deserialize)]
pub struct MeseParams {
    pub mese: Option<i32>,
    pub anno: Option<i32>,
    pub user_id: Option<uuid::Uuid>,
}
