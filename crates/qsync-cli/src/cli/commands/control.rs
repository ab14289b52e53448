//! `qsync control` – run a control operation on one item.

use anyhow::Result;
use qsync_core::api::{ControlOp, Transport};
use qsync_core::resource::ResourceClass;
use qsync_core::session::Session;

pub async fn run_control<T: Transport>(
    session: &Session<T>,
    class: ResourceClass,
    id: u64,
    op: ControlOp,
) -> Result<()> {
    session.control(class, id, op).await?;
    println!("{} {class} {id}: ok", op.as_str());
    Ok(())
}
