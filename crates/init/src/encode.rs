//! DER encoding of the card-resident directory files: object directory,
//! key/PIN directories and the token information file.
//!
//! Directory files are rewritten in full from the in-memory catalog;
//! records are concatenated TLV structures, one per object.

use cardsmith_card::CardPath;
use iso7816_tlv::ber::{Tag, Tlv, Value};

use crate::object::{DirectoryObject, ObjectPayload};
use crate::profile::Profile;
use crate::types::DfType;
use crate::{Error, Result};

const TAG_INTEGER: u8 = 0x02;
const TAG_BIT_STRING: u8 = 0x03;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_ENUMERATED: u8 = 0x0A;
const TAG_UTF8_STRING: u8 = 0x0C;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_CONTEXT_PRIMITIVE: u8 = 0x80;
const TAG_CONTEXT_CONSTRUCTED: u8 = 0xA0;

/// Common object flag bits.
const FLAG_PRIVATE: u16 = 1 << 0;
const FLAG_MODIFIABLE: u16 = 1 << 1;

/// Token flag bit: a PIN is required before use.
const TOKEN_LOGIN_REQUIRED: u16 = 1 << 0;

fn primitive(tag: u8, bytes: Vec<u8>) -> Result<Tlv> {
    Tlv::new(Tag::try_from(tag)?, Value::Primitive(bytes)).map_err(Error::from)
}

fn constructed(tag: u8, children: Vec<Tlv>) -> Result<Tlv> {
    Tlv::new(Tag::try_from(tag)?, Value::Constructed(children)).map_err(Error::from)
}

fn sequence(children: Vec<Tlv>) -> Result<Tlv> {
    constructed(TAG_SEQUENCE, children)
}

fn context(number: u8, children: Vec<Tlv>) -> Result<Tlv> {
    constructed(TAG_CONTEXT_CONSTRUCTED | number, children)
}

fn octet_string(bytes: &[u8]) -> Result<Tlv> {
    primitive(TAG_OCTET_STRING, bytes.to_vec())
}

fn utf8_string(s: &str) -> Result<Tlv> {
    primitive(TAG_UTF8_STRING, s.as_bytes().to_vec())
}

/// Minimal two's-complement content octets of a non-negative integer.
fn integer_bytes(value: u64) -> Vec<u8> {
    let mut bytes = value.to_be_bytes().to_vec();
    while bytes.len() > 1 && bytes[0] == 0 && bytes[1] & 0x80 == 0 {
        bytes.remove(0);
    }
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0);
    }
    bytes
}

fn integer(value: u64) -> Result<Tlv> {
    primitive(TAG_INTEGER, integer_bytes(value))
}

fn enumerated(value: u64) -> Result<Tlv> {
    primitive(TAG_ENUMERATED, integer_bytes(value))
}

/// DER BIT STRING over a flag mask, flag number `i` being bit `i` of the
/// string. The leading content octet counts unused bits in the final
/// octet; trailing zero octets are not emitted.
fn bit_string(flags: u16) -> Result<Tlv> {
    let Some(highest) = (0..16).rev().find(|i| flags & (1 << i) != 0) else {
        return primitive(TAG_BIT_STRING, vec![0]);
    };
    let mut content = vec![7 - (highest % 8) as u8];
    for byte in 0..=highest / 8 {
        let mut out = 0u8;
        for bit in 0..8 {
            if flags & (1 << (byte * 8 + bit)) != 0 {
                out |= 0x80 >> bit;
            }
        }
        content.push(out);
    }
    primitive(TAG_BIT_STRING, content)
}

/// PKCS#15 `Path`: a sequence wrapping the file path octets.
fn path_sequence(path: &CardPath) -> Result<Tlv> {
    sequence(vec![octet_string(path.as_bytes())?])
}

/// Common object attributes: label, flags and the protecting auth id.
fn common_attributes(object: &DirectoryObject) -> Result<Tlv> {
    let mut flags = FLAG_MODIFIABLE;
    if object.auth_id.is_some() || matches!(object.payload, ObjectPayload::Pin(_)) {
        flags |= FLAG_PRIVATE;
    }
    let mut children = vec![utf8_string(&object.label)?, bit_string(flags)?];
    if let Some(auth_id) = &object.auth_id {
        children.push(octet_string(auth_id.as_bytes())?);
    }
    sequence(children)
}

fn key_record(object: &DirectoryObject) -> Result<Tlv> {
    let info = object
        .key_info()
        .ok_or(Error::Encoding("key record without key info".into()))?;
    let class = sequence(vec![
        octet_string(info.id.as_bytes())?,
        bit_string(info.usage.bits())?,
    ])?;
    let attrs = context(
        1,
        vec![sequence(vec![
            path_sequence(&info.path)?,
            integer(info.key_length as u64)?,
        ])?],
    )?;
    let children = vec![common_attributes(object)?, class, attrs];
    match info.algorithm {
        crate::types::Algorithm::Rsa => sequence(children),
        // DSA keys are a tagged alternative of the key type choice.
        crate::types::Algorithm::Dsa => context(2, children),
    }
}

fn pin_record(object: &DirectoryObject) -> Result<Tlv> {
    let ObjectPayload::Pin(info) = &object.payload else {
        return Err(Error::Encoding("PIN record without PIN info".into()));
    };
    let class = sequence(vec![octet_string(info.auth_id.as_bytes())?])?;
    let attrs = context(
        1,
        vec![sequence(vec![
            bit_string(info.flags.bits())?,
            // PIN type: ascii-numeric.
            enumerated(1)?,
            integer(info.min_length as u64)?,
            integer(info.stored_length as u64)?,
            primitive(TAG_CONTEXT_PRIMITIVE, vec![info.reference])?,
            primitive(TAG_OCTET_STRING, vec![info.pad_char])?,
            path_sequence(&info.path)?,
        ])?],
    )?;
    sequence(vec![common_attributes(object)?, class, attrs])
}

/// Serialize one directory file from its catalog objects.
pub fn encode_df(ty: DfType, objects: &[DirectoryObject]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for object in objects {
        let record = match (ty, &object.payload) {
            (DfType::AuthObjects, ObjectPayload::Pin(_)) => pin_record(object)?,
            (DfType::PrivateKeys, ObjectPayload::PrivateKey(_))
            | (DfType::PublicKeys, ObjectPayload::PublicKey(_)) => key_record(object)?,
            _ => return Err(Error::Encoding(format!("object does not belong in the {ty}"))),
        };
        out.extend_from_slice(&record.to_vec());
    }
    Ok(out)
}

/// Serialize the object directory: one tagged path record per directory
/// file present on the card.
pub fn encode_odf(entries: &[(DfType, CardPath)]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for (ty, path) in entries {
        let record = constructed(
            TAG_CONTEXT_CONSTRUCTED | ty.odf_tag(),
            vec![path_sequence(path)?],
        )?;
        out.extend_from_slice(&record.to_vec());
    }
    Ok(out)
}

/// Serialize the token information file from the profile.
pub fn encode_tokeninfo(profile: &Profile) -> Result<Vec<u8>> {
    let mut flags = 0;
    if !profile.pins().is_empty() {
        flags |= TOKEN_LOGIN_REQUIRED;
    }
    let record = sequence(vec![
        integer(0)?,
        octet_string(&profile.serial)?,
        utf8_string(&profile.manufacturer)?,
        primitive(TAG_CONTEXT_PRIMITIVE, profile.label.as_bytes().to_vec())?,
        bit_string(flags)?,
    ])?;
    Ok(record.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardsmith_card::CardPath;

    use crate::object::{KeyInfo, PinInfo};
    use crate::types::{Algorithm, KeyUsage, ObjectId, PinFlags};

    fn parse_all(mut data: &[u8]) -> Vec<Tlv> {
        let mut out = Vec::new();
        while !data.is_empty() {
            let (tlv, rest) = Tlv::parse(data);
            out.push(tlv.unwrap());
            data = rest;
        }
        out
    }

    #[test]
    fn integers_use_minimal_content() {
        assert_eq!(integer_bytes(0), vec![0x00]);
        assert_eq!(integer_bytes(4), vec![0x04]);
        assert_eq!(integer_bytes(128), vec![0x00, 0x80]);
        assert_eq!(integer_bytes(1024), vec![0x04, 0x00]);
    }

    #[test]
    fn bit_strings_trim_trailing_zeros() {
        // sign (bit 2) alone: five unused bits, one content octet.
        let tlv = bit_string(KeyUsage::SIGN.bits()).unwrap();
        assert_eq!(tlv.to_vec(), vec![0x03, 0x02, 0x05, 0x20]);
        // derive (bit 8) forces a second octet.
        let tlv = bit_string(KeyUsage::DERIVE.bits()).unwrap();
        assert_eq!(tlv.to_vec(), vec![0x03, 0x03, 0x07, 0x00, 0x80]);
        // empty mask still carries the unused-bits octet.
        let tlv = bit_string(0).unwrap();
        assert_eq!(tlv.to_vec(), vec![0x03, 0x01, 0x00]);
    }

    fn key_object(algorithm: Algorithm) -> DirectoryObject {
        DirectoryObject {
            label: "Signing Key".into(),
            auth_id: Some(ObjectId::new(&[0x01])),
            payload: ObjectPayload::PrivateKey(KeyInfo {
                id: ObjectId::new(&[0x45]),
                usage: KeyUsage::SIGN | KeyUsage::DECRYPT,
                algorithm,
                key_length: 1024,
                path: CardPath::from_hex("3F0050154B01").unwrap(),
            }),
        }
    }

    #[test]
    fn key_records_concatenate_and_reparse() {
        let objects = vec![key_object(Algorithm::Rsa), key_object(Algorithm::Dsa)];
        let der = encode_df(DfType::PrivateKeys, &objects).unwrap();
        let records = parse_all(&der);
        assert_eq!(records.len(), 2);

        // RSA records are plain sequences, DSA records tagged [2].
        assert_eq!(records[0].tag(), &Tag::try_from(TAG_SEQUENCE).unwrap());
        assert_eq!(
            records[1].tag(),
            &Tag::try_from(TAG_CONTEXT_CONSTRUCTED | 2).unwrap()
        );

        let Value::Constructed(children) = records[0].value() else {
            panic!("record must be constructed");
        };
        assert_eq!(children.len(), 3);
        let Value::Constructed(common) = children[0].value() else {
            panic!("common attributes must be constructed");
        };
        let Value::Primitive(label) = common[0].value() else {
            panic!("label must be primitive");
        };
        assert_eq!(label.as_slice(), b"Signing Key");
    }

    #[test]
    fn pin_record_carries_reference_and_path() {
        let object = DirectoryObject {
            label: "User PIN".into(),
            auth_id: None,
            payload: ObjectPayload::Pin(PinInfo {
                auth_id: ObjectId::new(&[0x01]),
                reference: 0x81,
                flags: PinFlags::CASE_SENSITIVE | PinFlags::INITIALIZED,
                min_length: 4,
                stored_length: 8,
                pad_char: 0x00,
                path: CardPath::from_hex("3F0050150000").unwrap(),
            }),
        };
        let der = encode_df(DfType::AuthObjects, &[object]).unwrap();
        let hex = hex::encode_upper(&der);
        assert!(hex.contains("800181"), "PIN reference must be tagged [0]: {hex}");
        assert!(hex.contains("3F0050150000"), "PIN path missing: {hex}");
    }

    #[test]
    fn odf_entries_use_the_type_tag() {
        let entries = vec![
            (DfType::PrivateKeys, CardPath::from_hex("3F0050154401").unwrap()),
            (DfType::AuthObjects, CardPath::from_hex("3F0050154403").unwrap()),
        ];
        let der = encode_odf(&entries).unwrap();
        let records = parse_all(&der);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tag(), &Tag::try_from(0xA0).unwrap());
        assert_eq!(records[1].tag(), &Tag::try_from(0xA8).unwrap());
    }

    #[test]
    fn mismatched_object_type_is_rejected() {
        let objects = vec![key_object(Algorithm::Rsa)];
        assert!(matches!(
            encode_df(DfType::AuthObjects, &objects),
            Err(Error::Encoding(_))
        ));
    }
}
