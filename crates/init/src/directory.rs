//! Maintenance of the card-resident directory files. Every mutation of
//! the catalog ends with a full rewrite of the affected directory file,
//! and the object directory is (re)written before the first entry of a
//! type so a reader never sees a dangling reference.

use tracing::debug;

use crate::auth::AuthCtx;
use crate::encode;
use crate::object::Catalog;
use crate::types::DfType;
use crate::{Error, Result};

/// Rewrite the directory file(s) of one type from the catalog.
///
/// On the first call for a type the profile's directory descriptor is
/// registered in the catalog and the object directory is updated first,
/// so the new directory file is announced before it exists.
pub(crate) fn update_df(ctx: &mut AuthCtx<'_>, catalog: &mut Catalog, ty: DfType) -> Result<()> {
    if catalog.files(ty).is_empty() {
        let file = ctx
            .profile
            .df_file(ty)
            .cloned()
            .ok_or(Error::NotSupported("profile assigns no directory file"))?;
        catalog.register_file(ty, file);
        update_odf(ctx, catalog)?;
    }

    let data = encode::encode_df(ty, catalog.objects(ty))?;
    debug!(%ty, bytes = data.len(), "rewriting directory file");
    for file in catalog.files(ty) {
        ctx.update_file(file, &data)?;
    }
    Ok(())
}

/// Rewrite the object directory from the registered directory files.
pub(crate) fn update_odf(ctx: &mut AuthCtx<'_>, catalog: &Catalog) -> Result<()> {
    let data = encode::encode_odf(&catalog.directory_entries())?;
    let file = ctx.profile.odf.clone();
    ctx.update_file(&file, &data)
}

/// Rewrite the token information file from the profile.
pub(crate) fn update_tokeninfo(ctx: &mut AuthCtx<'_>) -> Result<()> {
    let data = encode::encode_tokeninfo(ctx.profile)?;
    let file = ctx.profile.tokeninfo.clone();
    ctx.update_file(&file, &data)
}
