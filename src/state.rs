use crate::{
    db::{DbPool, OrmConn},
    mpesa::MpesaGateway,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub mpesa: MpesaGateway,
}
