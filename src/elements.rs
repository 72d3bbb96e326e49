//! Decode plain nodes, ways and relations into primitives

use crate::block::str_from_stringtable;
use crate::error::{new_malformed_error, MalformedInput, Result};
use crate::primitive::{Member, Path, Point, PrimitiveKind, Relation, Tag};
use crate::proto::osmformat;
use crate::proto::osmformat::PrimitiveBlock;

/// Converts an identifier from the wire representation.
pub(crate) fn to_id(id: i64) -> Result<u64> {
    u64::try_from(id).map_err(|_| new_malformed_error(MalformedInput::NegativeId { id }))
}

/// Adds a delta to a running value of a delta coded array.
pub(crate) fn apply_delta(current: i64, delta: i64, field: &'static str) -> Result<i64> {
    current
        .checked_add(delta)
        .ok_or_else(|| new_malformed_error(MalformedInput::Overflow { field }))
}

fn to_nano(offset: i64, granularity: i32, value: i64, field: &'static str) -> Result<i64> {
    i64::from(granularity)
        .checked_mul(value)
        .and_then(|v| v.checked_add(offset))
        .ok_or_else(|| new_malformed_error(MalformedInput::Overflow { field }))
}

/// Converts a coordinate on the block's granularity grid to nanodegrees.
pub(crate) fn nano_lat(block: &PrimitiveBlock, lat: i64) -> Result<i64> {
    to_nano(block.lat_offset(), block.granularity(), lat, "latitude")
}

pub(crate) fn nano_lon(block: &PrimitiveBlock, lon: i64) -> Result<i64> {
    to_nano(block.lon_offset(), block.granularity(), lon, "longitude")
}

pub(crate) fn tag_from_indices(block: &PrimitiveBlock, key: usize, val: usize) -> Result<Tag> {
    Ok(Tag::new(
        str_from_stringtable(block, key)?,
        str_from_stringtable(block, val)?,
    ))
}

fn same_len(lens: &[usize], field: &'static str) -> Result<()> {
    if lens.windows(2).all(|w| w[0] == w[1]) {
        Ok(())
    } else {
        Err(new_malformed_error(MalformedInput::InconsistentArrays {
            field,
        }))
    }
}

fn decode_tags(block: &PrimitiveBlock, keys: &[u32], vals: &[u32]) -> Result<Vec<Tag>> {
    same_len(&[keys.len(), vals.len()], "keys/vals")?;
    keys.iter()
        .zip(vals)
        .map(|(&k, &v)| tag_from_indices(block, k as usize, v as usize))
        .collect()
}

/// Decodes a node that is stored without dense encoding.
pub(crate) fn decode_node(block: &PrimitiveBlock, node: &osmformat::Node) -> Result<Point> {
    Ok(Point {
        id: to_id(node.id())?,
        nano_lat: nano_lat(block, node.lat())?,
        nano_lon: nano_lon(block, node.lon())?,
        tags: decode_tags(block, &node.keys, &node.vals)?,
    })
}

/// Decodes a way. Its node references are delta encoded.
pub(crate) fn decode_way(block: &PrimitiveBlock, way: &osmformat::Way) -> Result<Path> {
    let mut current = 0_i64;
    let refs = way
        .refs
        .iter()
        .map(|&delta| {
            current = apply_delta(current, delta, "way refs")?;
            to_id(current)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Path {
        id: to_id(way.id())?,
        refs,
        tags: decode_tags(block, &way.keys, &way.vals)?,
    })
}

fn member_kind(
    member_type: protobuf::EnumOrUnknown<osmformat::relation::MemberType>,
) -> Result<PrimitiveKind> {
    use osmformat::relation::MemberType;

    match member_type.enum_value() {
        Ok(MemberType::NODE) => Ok(PrimitiveKind::Point),
        Ok(MemberType::WAY) => Ok(PrimitiveKind::Path),
        Ok(MemberType::RELATION) => Ok(PrimitiveKind::Relation),
        Err(value) => Err(new_malformed_error(MalformedInput::UnknownMemberType {
            value,
        })),
    }
}

/// Decodes a relation. Member ids are delta encoded.
pub(crate) fn decode_relation(
    block: &PrimitiveBlock,
    rel: &osmformat::Relation,
) -> Result<Relation> {
    same_len(
        &[rel.roles_sid.len(), rel.memids.len(), rel.types.len()],
        "relation members",
    )?;

    let mut current = 0_i64;
    let members = rel
        .roles_sid
        .iter()
        .zip(&rel.memids)
        .zip(&rel.types)
        .map(|((&role_sid, &delta), &member_type)| {
            current = apply_delta(current, delta, "member ids")?;
            Ok(Member {
                kind: member_kind(member_type)?,
                id: to_id(current)?,
                role: str_from_stringtable(block, role_sid as usize)?.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Relation {
        id: to_id(rel.id())?,
        members,
        tags: decode_tags(block, &rel.keys, &rel.vals)?,
    })
}
