// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

use crate::error::Result;
use crate::pkcs11::*;

/// A single PKCS#11 attribute with its value held in the serialized form
/// handed back to applications: booleans are one byte, CK_ULONGs are
/// native-endian words, everything else is an opaque byte string.
#[derive(Debug, Clone)]
pub struct Attribute {
    ck_type: CK_ATTRIBUTE_TYPE,
    value: Vec<u8>,
}

impl Attribute {
    pub fn get_type(&self) -> CK_ATTRIBUTE_TYPE {
        self.ck_type
    }

    pub fn get_value(&self) -> &Vec<u8> {
        &self.value
    }

    pub fn match_ck_attr(&self, attr: &CK_ATTRIBUTE) -> bool {
        if self.ck_type != attr.type_ {
            return false;
        }
        match attr.to_buf() {
            Ok(buf) => buf == self.value,
            Err(_) => false,
        }
    }
}

pub fn from_bool(t: CK_ATTRIBUTE_TYPE, val: bool) -> Attribute {
    Attribute {
        ck_type: t,
        value: Vec::from(if val { &[1u8][..] } else { &[0u8][..] }),
    }
}

pub fn from_ulong(t: CK_ATTRIBUTE_TYPE, val: CK_ULONG) -> Attribute {
    Attribute {
        ck_type: t,
        value: Vec::from(val.to_ne_bytes()),
    }
}

pub fn from_string(t: CK_ATTRIBUTE_TYPE, val: String) -> Attribute {
    Attribute {
        ck_type: t,
        value: Vec::from(val.as_bytes()),
    }
}

pub fn from_bytes(t: CK_ATTRIBUTE_TYPE, val: Vec<u8>) -> Attribute {
    Attribute {
        ck_type: t,
        value: val,
    }
}

/// CKA_ALLOWED_MECHANISMS is a CK_MECHANISM_TYPE array, serialized as
/// consecutive native-endian words
pub fn from_mech_array(
    t: CK_ATTRIBUTE_TYPE,
    vals: &[CK_MECHANISM_TYPE],
) -> Attribute {
    let mut value = Vec::with_capacity(
        vals.len() * std::mem::size_of::<CK_MECHANISM_TYPE>(),
    );
    for v in vals {
        value.extend_from_slice(&v.to_ne_bytes());
    }
    Attribute {
        ck_type: t,
        value: value,
    }
}

/// The attribute bag of one object. Insertion order is preserved so the
/// serialized view of an object is stable; types are unique.
#[derive(Debug, Clone, Default)]
pub struct AttributeMap {
    attrs: Vec<Attribute>,
}

impl AttributeMap {
    pub fn new() -> AttributeMap {
        AttributeMap { attrs: Vec::new() }
    }

    /// Inserts or replaces the attribute of the same type
    pub fn set(&mut self, attr: Attribute) {
        for a in self.attrs.iter_mut() {
            if a.ck_type == attr.ck_type {
                *a = attr;
                return;
            }
        }
        self.attrs.push(attr);
    }

    pub fn set_bool(&mut self, t: CK_ATTRIBUTE_TYPE, val: bool) {
        self.set(from_bool(t, val));
    }

    pub fn set_ulong(&mut self, t: CK_ATTRIBUTE_TYPE, val: CK_ULONG) {
        self.set(from_ulong(t, val));
    }

    pub fn set_string(&mut self, t: CK_ATTRIBUTE_TYPE, val: String) {
        self.set(from_string(t, val));
    }

    pub fn set_bytes(&mut self, t: CK_ATTRIBUTE_TYPE, val: Vec<u8>) {
        self.set(from_bytes(t, val));
    }

    /// The serialized value of an attribute, None when the object does
    /// not carry it
    pub fn value(&self, t: CK_ATTRIBUTE_TYPE) -> Option<&[u8]> {
        self.attrs
            .iter()
            .find(|a| a.ck_type == t)
            .map(|a| a.value.as_slice())
    }

    /// Byte-exact template match: every template attribute must be
    /// present with an identical serialized value
    pub fn match_template(&self, template: &[CK_ATTRIBUTE]) -> bool {
        for ck_attr in template {
            match self.attrs.iter().find(|a| a.ck_type == ck_attr.type_) {
                Some(attr) => {
                    if !attr.match_ck_attr(ck_attr) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }
}

impl CK_ATTRIBUTE {
    pub fn to_buf(&self) -> Result<Vec<u8>> {
        if self.pValue.is_null() && self.ulValueLen != 0 {
            return Err(CKR_ARGUMENTS_BAD)?;
        }
        if self.ulValueLen == 0 {
            return Ok(Vec::new());
        }
        let buf: &[u8] = unsafe {
            std::slice::from_raw_parts(
                self.pValue as *const u8,
                self.ulValueLen as usize,
            )
        };
        Ok(buf.to_vec())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_replaces() {
        let mut map = AttributeMap::new();
        map.set_bool(CKA_TOKEN, true);
        map.set_bool(CKA_TOKEN, false);
        assert_eq!(map.len(), 1);
        assert_eq!(map.value(CKA_TOKEN), Some(&[0u8][..]));
    }

    #[test]
    fn ulong_serialization() {
        let mut map = AttributeMap::new();
        map.set_ulong(CKA_CLASS, CKO_PRIVATE_KEY);
        let val = map.value(CKA_CLASS).unwrap();
        assert_eq!(val, &CKO_PRIVATE_KEY.to_ne_bytes());
    }

    #[test]
    fn template_matching() {
        let mut map = AttributeMap::new();
        map.set_ulong(CKA_CLASS, CKO_PUBLIC_KEY);
        map.set_bool(CKA_VERIFY, true);

        let class_val = CKO_PUBLIC_KEY;
        let tmpl = [CK_ATTRIBUTE {
            type_: CKA_CLASS,
            pValue: &class_val as *const _ as CK_VOID_PTR,
            ulValueLen: std::mem::size_of::<CK_ULONG>() as CK_ULONG,
        }];
        assert!(map.match_template(&tmpl));

        let wrong = CKO_PRIVATE_KEY;
        let tmpl = [CK_ATTRIBUTE {
            type_: CKA_CLASS,
            pValue: &wrong as *const _ as CK_VOID_PTR,
            ulValueLen: std::mem::size_of::<CK_ULONG>() as CK_ULONG,
        }];
        assert!(!map.match_template(&tmpl));

        /* attribute the object does not carry never matches */
        let tmpl = [CK_ATTRIBUTE {
            type_: CKA_MODULUS,
            pValue: std::ptr::null_mut(),
            ulValueLen: 0,
        }];
        assert!(!map.match_template(&tmpl));

        /* empty template matches everything */
        assert!(map.match_template(&[]));
    }
}
