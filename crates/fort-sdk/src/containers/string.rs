//! Mirrored `FString`: a `TArray` of UTF-16 code units with a trailing zero.
//!
//! A non-empty string always ends in a terminator, so `Len() == Num() - 1`.
//! An empty string owns no buffer at all (`Num() == 0`).

use std::fmt;

use super::SizeType;
use super::array::TArray;
use super::set::TypeHash;
use crate::memory::{self, Address};
use crate::{check, ensure_msgf};

/// Wide character of the foreign runtime
pub type TChar = u16;

const TERMINATOR: TChar = 0;

#[repr(C)]
#[derive(Clone, Default)]
pub struct FString {
    data: TArray<TChar>,
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    use crate::memory::layout::string;
    use std::mem::{offset_of, size_of};

    assert!(size_of::<FString>() == string::SIZE);
    assert!(offset_of!(FString, data) == string::DATA);
};

impl FString {
    pub const fn new() -> Self {
        Self { data: TArray::new() }
    }

    /// Views a foreign `FString` in place.
    ///
    /// # Safety
    ///
    /// `address` must point at a live `FString` for `'a` whose buffer holds
    /// `Num` initialized code units.
    pub unsafe fn from_address<'a>(address: Address) -> &'a Self {
        let string: &Self = unsafe { memory::view(address) };
        string.data.check_invariants();
        string
    }

    /// Copies code units up to (not including) the first zero.
    pub fn from_wide(units: &[TChar]) -> Self {
        let len = units
            .iter()
            .position(|&unit| unit == TERMINATOR)
            .unwrap_or(units.len());
        let mut string = Self::new();
        string.push_units(&units[..len]);
        string
    }

    /// Copies a zero-terminated wide string. A null pointer yields an empty
    /// string.
    ///
    /// # Safety
    ///
    /// A non-null `units` must point at readable code units ending in a zero.
    pub unsafe fn from_wide_ptr(units: *const TChar) -> Self {
        if units.is_null() {
            return Self::new();
        }
        let mut len = 0;
        while unsafe { *units.add(len) } != TERMINATOR {
            len += 1;
        }
        Self::from_wide(unsafe { std::slice::from_raw_parts(units, len) })
    }

    /// Length in characters, excluding the terminator.
    pub fn len(&self) -> SizeType {
        if self.data.num() > 0 {
            self.data.num() - 1
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_valid_index(&self, index: SizeType) -> bool {
        index >= 0 && index < self.len()
    }

    /// Backing array, terminator included.
    pub fn get_char_array(&self) -> &TArray<TChar> {
        &self.data
    }

    /// Code units without the terminator. A foreign string whose final unit
    /// is not zero is reported once and returned whole.
    pub fn as_wide(&self) -> &[TChar] {
        let units = self.data.as_slice();
        match units.split_last() {
            None => &[],
            Some((&last, rest)) => {
                if ensure_msgf!(
                    last == TERMINATOR,
                    "FString of {} units is missing its terminator",
                    units.len()
                ) {
                    rest
                } else {
                    units
                }
            }
        }
    }

    /// Owned copy with a trailing zero, ready to hand to wide-string APIs.
    pub fn to_wide(&self) -> Vec<TChar> {
        let mut units = self.as_wide().to_vec();
        units.push(TERMINATOR);
        units
    }

    fn push_units(&mut self, units: &[TChar]) {
        if units.is_empty() {
            return;
        }
        if self.data.num() > 0 {
            self.data.pop();
        }
        self.data.append(units);
        self.data.add(TERMINATOR);
    }

    pub fn append(&mut self, other: &FString) {
        self.push_units(other.as_wide());
    }

    pub fn append_str(&mut self, text: &str) {
        let units: Vec<TChar> = text.encode_utf16().collect();
        self.push_units(&units);
    }

    pub fn append_char(&mut self, character: char) {
        let mut buffer = [0; 2];
        let units = character.encode_utf16(&mut buffer);
        check!(!units.contains(&TERMINATOR));
        self.push_units(units);
    }

    /// Index of the first occurrence of `needle`, compared by code unit.
    pub fn find(&self, needle: &str) -> Option<SizeType> {
        let needle: Vec<TChar> = needle.encode_utf16().collect();
        find_units(self.as_wide(), &needle, 0)
    }

    /// Splits on `delimiter` and appends the pieces to `out`, skipping empty
    /// ones when `cull_empty` is set. Returns the length of `out`.
    ///
    /// An empty delimiter never splits: the whole string is one piece.
    pub fn parse_into_array(
        &self,
        out: &mut TArray<FString>,
        delimiter: &str,
        cull_empty: bool,
    ) -> SizeType {
        let units = self.as_wide();
        let delimiter: Vec<TChar> = delimiter.encode_utf16().collect();

        let mut push = |piece: &[TChar]| {
            if !cull_empty || !piece.is_empty() {
                out.add(FString::from_wide(piece));
            }
        };

        let mut start = 0;
        if !delimiter.is_empty() {
            while let Some(at) = find_units(units, &delimiter, start) {
                let at = at as usize;
                push(&units[start..at]);
                start = at + delimiter.len();
            }
        }
        push(&units[start..]);

        out.num()
    }

    /// Case-insensitive comparison.
    pub fn equals_ignore_case(&self, other: &FString) -> bool {
        let (a, b) = (self.as_wide(), other.as_wide());
        a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| to_upper(x) == to_upper(y))
    }
}

fn find_units(haystack: &[TChar], needle: &[TChar], from: usize) -> Option<SizeType> {
    if needle.is_empty() {
        return (from <= haystack.len()).then_some(from as SizeType);
    }
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| (from + offset) as SizeType)
}

/// Upper-cases one code unit when the result is also a single unit.
fn to_upper(unit: TChar) -> TChar {
    if unit < 0x80 {
        return (unit as u8).to_ascii_uppercase() as TChar;
    }
    let Some(character) = char::from_u32(unit as u32) else {
        return unit;
    };
    let mut upper = character.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(single), None) if (single as u32) <= 0xFFFF => single as u32 as TChar,
        _ => unit,
    }
}

const CRC_POLYNOMIAL: u32 = 0x04C1_1DB7;

/// MSB-first table of the CRC-32 polynomial, the foreign runtime's
/// `CRCTable_DEPRECATED`. Entry 1 is the polynomial itself.
const fn crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut index = 0;
    while index < 256 {
        let mut crc = (index as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 { (crc << 1) ^ CRC_POLYNOMIAL } else { crc << 1 };
            bit += 1;
        }
        table[index] = crc;
        index += 1;
    }
    table
}

static CRC_TABLE: [u32; 256] = crc32_table();

/// Case-insensitive hash of the text (`FCrc::Strihash_DEPRECATED`): each
/// upper-cased code unit is fed low byte first through the MSB-first table
/// with a right-shifting register.
pub fn str_ihash(units: &[TChar]) -> u32 {
    let mut hash: u32 = 0;
    for &unit in units {
        let upper = to_upper(unit);
        for byte in [upper as u8, (upper >> 8) as u8] {
            hash = ((hash >> 8) & 0x00FF_FFFF) ^ CRC_TABLE[((hash ^ byte as u32) & 0xFF) as usize];
        }
    }
    hash
}

impl TypeHash for FString {
    fn get_type_hash(&self) -> u32 {
        str_ihash(self.as_wide())
    }
}

/// Content comparison, case-sensitive.
impl PartialEq for FString {
    fn eq(&self, other: &Self) -> bool {
        self.as_wide() == other.as_wide()
    }
}

impl Eq for FString {}

impl PartialEq<str> for FString {
    fn eq(&self, other: &str) -> bool {
        self.as_wide().iter().copied().eq(other.encode_utf16())
    }
}

impl PartialEq<&str> for FString {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

impl From<&str> for FString {
    fn from(text: &str) -> Self {
        let mut string = FString::new();
        string.append_str(text);
        string
    }
}

impl From<String> for FString {
    fn from(text: String) -> Self {
        FString::from(text.as_str())
    }
}

impl From<&FString> for String {
    fn from(string: &FString) -> Self {
        String::from_utf16_lossy(string.as_wide())
    }
}

impl fmt::Display for FString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf16_lossy(self.as_wide()))
    }
}

impl fmt::Debug for FString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FString({:?})", self.to_string())
    }
}
