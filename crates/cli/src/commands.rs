//! Command implementations.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use cardsmith_card::MockCard;
use cardsmith_init::{DfType, KeyMaterial, KeyRequest, ObjectId, Personalizer};
use pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPublicKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use tracing::info;

pub(crate) fn erase_command(session: &mut Personalizer<MockCard>) -> Result<()> {
    session.erase_card()?;
    println!("PKCS#15 application erased.");
    Ok(())
}

pub(crate) fn create_command(
    session: &mut Personalizer<MockCard>,
    label: Option<&str>,
) -> Result<()> {
    if let Some(label) = label {
        session.profile_mut().label = label.to_string();
    }
    session.add_application()?;
    println!("PKCS#15 application created.");
    for object in session.objects(DfType::AuthObjects) {
        println!("  PIN object: {} (auth id {})", object.label, object.id());
    }
    Ok(())
}

pub(crate) fn generate_command(
    session: &mut Personalizer<MockCard>,
    spec: &str,
    id: Option<&str>,
    label: Option<&str>,
    native: bool,
    public_key_file: Option<&Path>,
) -> Result<()> {
    session.add_application()?;

    let mut request = KeyRequest::from_str(spec)?.native(native);
    request = apply_common(request, id, label)?;
    let id = session.generate_key(&mut request)?;
    info!(%id, "key pair generated");
    println!("Generated key pair with id {id}.");

    if let Some(path) = public_key_file {
        write_public_key(&request, path)?;
        println!("Public key written to {}.", path.display());
    }
    Ok(())
}

pub(crate) fn store_command(
    session: &mut Personalizer<MockCard>,
    file: &Path,
    id: Option<&str>,
    label: Option<&str>,
    public_key_file: Option<&Path>,
) -> Result<()> {
    session.add_application()?;

    let material = read_private_key(file)?;
    let mut request = KeyRequest::new(material.algorithm(), material.bits())
        .with_material(material);
    request = apply_common(request, id, label)?;
    let id = session.store_key(&mut request)?;
    println!("Stored key pair with id {id}.");

    if let Some(path) = public_key_file {
        write_public_key(&request, path)?;
        println!("Public key written to {}.", path.display());
    }
    Ok(())
}

fn apply_common(
    mut request: KeyRequest,
    id: Option<&str>,
    label: Option<&str>,
) -> Result<KeyRequest> {
    if let Some(id) = id {
        request = request.with_id(ObjectId::from_hex(id)?);
    }
    if let Some(label) = label {
        request = request.with_label(label);
    }
    Ok(request)
}

/// Load an RSA private key from PEM, accepting PKCS#8 and PKCS#1 forms.
fn read_private_key(path: &Path) -> Result<KeyMaterial> {
    let pem = fs::read_to_string(path)
        .with_context(|| format!("reading key from {}", path.display()))?;
    let key = rsa::RsaPrivateKey::from_pkcs8_pem(&pem)
        .or_else(|_| rsa::RsaPrivateKey::from_pkcs1_pem(&pem))
        .context("key file is not an RSA private key in PEM form")?;
    Ok(KeyMaterial::Rsa(Box::new(key)))
}

fn write_public_key(request: &KeyRequest, path: &Path) -> Result<()> {
    let Some(material) = &request.material else {
        bail!("no key material available for export");
    };
    match material {
        KeyMaterial::Rsa(key) => {
            let pem = RsaPublicKey::from(key.as_ref()).to_public_key_pem(LineEnding::LF)?;
            fs::write(path, pem)?;
        }
        KeyMaterial::Dsa(_) => {
            // No PEM writer for DSA in the stack; emit raw DER.
            fs::write(path, material.public_key_der()?)?;
        }
    }
    Ok(())
}
