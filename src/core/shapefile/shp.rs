//! ESRI `.shp` records and the `.shx` index.
//!
//! Line and polygon records are decoded into [`PolyShape`] so they can be
//! simplified. Every other non-null record type is carried as raw bytes.

use crate::utils::error::{IngestError, Result};
use geo::{Coord, Rect};

const FILE_CODE: i32 = 9994;
const VERSION: i32 = 1000;
pub(crate) const FILE_HEADER_LEN: usize = 100;
const RECORD_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
    MultiPatch,
}

impl ShapeType {
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => ShapeType::Null,
            1 => ShapeType::Point,
            3 => ShapeType::PolyLine,
            5 => ShapeType::Polygon,
            8 => ShapeType::MultiPoint,
            11 => ShapeType::PointZ,
            13 => ShapeType::PolyLineZ,
            15 => ShapeType::PolygonZ,
            18 => ShapeType::MultiPointZ,
            21 => ShapeType::PointM,
            23 => ShapeType::PolyLineM,
            25 => ShapeType::PolygonM,
            28 => ShapeType::MultiPointM,
            31 => ShapeType::MultiPatch,
            _ => return None,
        })
    }

    pub fn code(&self) -> i32 {
        match self {
            ShapeType::Null => 0,
            ShapeType::Point => 1,
            ShapeType::PolyLine => 3,
            ShapeType::Polygon => 5,
            ShapeType::MultiPoint => 8,
            ShapeType::PointZ => 11,
            ShapeType::PolyLineZ => 13,
            ShapeType::PolygonZ => 15,
            ShapeType::MultiPointZ => 18,
            ShapeType::PointM => 21,
            ShapeType::PolyLineM => 23,
            ShapeType::PolygonM => 25,
            ShapeType::MultiPointM => 28,
            ShapeType::MultiPatch => 31,
        }
    }

    pub fn is_polyline(&self) -> bool {
        matches!(
            self,
            ShapeType::PolyLine | ShapeType::PolyLineZ | ShapeType::PolyLineM
        )
    }

    pub fn is_polygon(&self) -> bool {
        matches!(
            self,
            ShapeType::Polygon | ShapeType::PolygonZ | ShapeType::PolygonM
        )
    }

    pub fn has_z(&self) -> bool {
        matches!(
            self,
            ShapeType::PointZ
                | ShapeType::PolyLineZ
                | ShapeType::PolygonZ
                | ShapeType::MultiPointZ
                | ShapeType::MultiPatch
        )
    }

    /// 是否可能帶 M 值（Z 類型的 M 區段為選用）
    pub fn has_m(&self) -> bool {
        self.has_z()
            || matches!(
                self,
                ShapeType::PointM
                    | ShapeType::PolyLineM
                    | ShapeType::PolygonM
                    | ShapeType::MultiPointM
            )
    }
}

/// 線或多邊形的一個 part（多邊形則為一個 ring）
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub coords: Vec<Coord<f64>>,
    pub z: Option<Vec<f64>>,
    pub m: Option<Vec<f64>>,
}

impl Part {
    pub fn new(coords: Vec<Coord<f64>>) -> Self {
        Self {
            coords,
            z: None,
            m: None,
        }
    }

    /// 只保留指定索引的頂點，Z/M 跟著頂點走
    pub fn select(&self, indices: &[usize]) -> Self {
        let pick = |values: &Vec<f64>| indices.iter().map(|&i| values[i]).collect::<Vec<_>>();
        Self {
            coords: indices.iter().map(|&i| self.coords[i]).collect(),
            z: self.z.as_ref().map(pick),
            m: self.m.as_ref().map(pick),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolyShape {
    pub shape_type: ShapeType,
    pub parts: Vec<Part>,
}

impl PolyShape {
    pub fn vertex_count(&self) -> usize {
        self.parts.iter().map(|p| p.coords.len()).sum()
    }

    fn bbox(&self) -> Option<Rect<f64>> {
        bbox_of(self.parts.iter().flat_map(|p| p.coords.iter().copied()))
    }
}

/// 不需要解析內容的紀錄（點、多點、multipatch）
#[derive(Debug, Clone, PartialEq)]
pub struct RawShape {
    pub shape_type: ShapeType,
    pub content: Vec<u8>,
    pub bbox: Option<Rect<f64>>,
    pub point_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Null,
    Poly(PolyShape),
    Raw(RawShape),
}

impl Shape {
    pub fn polygon(rings: Vec<Vec<Coord<f64>>>) -> Self {
        Shape::Poly(PolyShape {
            shape_type: ShapeType::Polygon,
            parts: rings.into_iter().map(Part::new).collect(),
        })
    }

    pub fn polyline(lines: Vec<Vec<Coord<f64>>>) -> Self {
        Shape::Poly(PolyShape {
            shape_type: ShapeType::PolyLine,
            parts: lines.into_iter().map(Part::new).collect(),
        })
    }

    pub fn point(x: f64, y: f64) -> Self {
        let mut content = Vec::with_capacity(20);
        content.extend_from_slice(&ShapeType::Point.code().to_le_bytes());
        content.extend_from_slice(&x.to_le_bytes());
        content.extend_from_slice(&y.to_le_bytes());
        Shape::Raw(RawShape {
            shape_type: ShapeType::Point,
            content,
            bbox: Some(Rect::new(Coord { x, y }, Coord { x, y })),
            point_count: 1,
        })
    }

    /// Null 或沒有任何頂點
    pub fn is_empty(&self) -> bool {
        self.vertex_count() == 0
    }

    pub fn vertex_count(&self) -> usize {
        match self {
            Shape::Null => 0,
            Shape::Poly(poly) => poly.vertex_count(),
            Shape::Raw(raw) => raw.point_count,
        }
    }

    pub(crate) fn bbox(&self) -> Option<Rect<f64>> {
        match self {
            Shape::Null => None,
            Shape::Poly(poly) => poly.bbox(),
            Shape::Raw(raw) => raw.bbox,
        }
    }

    pub(crate) fn decode(content: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(content);
        let code = reader.i32_le()?;
        let shape_type = ShapeType::from_code(code)
            .ok_or_else(|| shp_error(format!("unknown shape type {}", code)))?;

        match shape_type {
            ShapeType::Null => Ok(Shape::Null),
            t if t.is_polyline() || t.is_polygon() => decode_poly(t, &mut reader).map(Shape::Poly),
            ShapeType::Point | ShapeType::PointZ | ShapeType::PointM => {
                let x = reader.f64_le()?;
                let y = reader.f64_le()?;
                Ok(Shape::Raw(RawShape {
                    shape_type,
                    content: content.to_vec(),
                    bbox: Some(Rect::new(Coord { x, y }, Coord { x, y })),
                    point_count: 1,
                }))
            }
            _ => {
                // MultiPoint: bbox, numPoints; MultiPatch: bbox, numParts, numPoints
                let bbox = reader.rect()?;
                if shape_type == ShapeType::MultiPatch {
                    reader.i32_le()?;
                }
                let point_count = reader.count()?;
                Ok(Shape::Raw(RawShape {
                    shape_type,
                    content: content.to_vec(),
                    bbox: (point_count > 0).then_some(bbox),
                    point_count,
                }))
            }
        }
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        match self {
            Shape::Null => ShapeType::Null.code().to_le_bytes().to_vec(),
            Shape::Raw(raw) => raw.content.clone(),
            Shape::Poly(poly) => encode_poly(poly),
        }
    }
}

fn decode_poly(shape_type: ShapeType, reader: &mut ByteReader<'_>) -> Result<PolyShape> {
    reader.rect()?;
    let num_parts = reader.count()?;
    let num_points = reader.count()?;
    // 宣告的數量必須放得進剩餘內容，否則視為損毀
    let needed = num_parts
        .checked_mul(4)
        .zip(num_points.checked_mul(16))
        .and_then(|(a, b)| a.checked_add(b));
    if needed.map_or(true, |n| n > reader.remaining()) {
        return Err(shp_error(format!(
            "record declares {} parts and {} points beyond its length",
            num_parts, num_points
        )));
    }

    let mut starts = Vec::with_capacity(num_parts);
    for _ in 0..num_parts {
        starts.push(reader.count()?);
    }
    let mut coords = Vec::with_capacity(num_points);
    for _ in 0..num_points {
        coords.push(Coord {
            x: reader.f64_le()?,
            y: reader.f64_le()?,
        });
    }

    let z = if shape_type.has_z() {
        Some(reader.measures(num_points)?)
    } else {
        None
    };
    // M 區段為選用，只在剩餘長度足夠時讀取
    let m = if shape_type.has_m() && reader.remaining() >= 16 + 8 * num_points {
        Some(reader.measures(num_points)?)
    } else {
        None
    };

    let mut parts = Vec::with_capacity(num_parts);
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(num_points);
        if start > end || end > num_points {
            return Err(shp_error(format!("invalid part offsets {}..{}", start, end)));
        }
        parts.push(Part {
            coords: coords[start..end].to_vec(),
            z: z.as_ref().map(|v| v[start..end].to_vec()),
            m: m.as_ref().map(|v| v[start..end].to_vec()),
        });
    }

    Ok(PolyShape { shape_type, parts })
}

fn encode_poly(poly: &PolyShape) -> Vec<u8> {
    let num_points = poly.vertex_count();
    let mut out = Vec::with_capacity(44 + 4 * poly.parts.len() + 32 * num_points);

    out.extend_from_slice(&poly.shape_type.code().to_le_bytes());
    write_rect(&mut out, poly.bbox());
    out.extend_from_slice(&(poly.parts.len() as i32).to_le_bytes());
    out.extend_from_slice(&(num_points as i32).to_le_bytes());

    let mut start = 0i32;
    for part in &poly.parts {
        out.extend_from_slice(&start.to_le_bytes());
        start += part.coords.len() as i32;
    }
    for coord in poly.parts.iter().flat_map(|p| p.coords.iter()) {
        out.extend_from_slice(&coord.x.to_le_bytes());
        out.extend_from_slice(&coord.y.to_le_bytes());
    }

    if poly.shape_type.has_z() {
        let zs: Vec<f64> = poly
            .parts
            .iter()
            .flat_map(|p| match &p.z {
                Some(z) => z.clone(),
                None => vec![0.0; p.coords.len()],
            })
            .collect();
        write_measures(&mut out, &zs);
    }
    let has_m = !poly.parts.is_empty() && poly.parts.iter().all(|p| p.m.is_some());
    if poly.shape_type.has_m() && has_m {
        let ms: Vec<f64> = poly
            .parts
            .iter()
            .flat_map(|p| p.m.clone().unwrap_or_default())
            .collect();
        write_measures(&mut out, &ms);
    }
    out
}

/// 解析後的 `.shp`：檔頭資訊與所有紀錄
#[derive(Debug, Clone)]
pub(crate) struct ShpFile {
    pub shape_type: ShapeType,
    pub z_range: [f64; 2],
    pub m_range: [f64; 2],
    pub shapes: Vec<Shape>,
}

impl ShpFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FILE_HEADER_LEN {
            return Err(shp_error("file shorter than header"));
        }
        let mut header = ByteReader::new(&bytes[..FILE_HEADER_LEN]);
        if header.i32_be()? != FILE_CODE {
            return Err(shp_error("bad file code"));
        }
        header.skip(20)?;
        let declared_words = header.i32_be()?;
        let declared_len = usize::try_from(declared_words)
            .ok()
            .and_then(|w| w.checked_mul(2))
            .ok_or_else(|| shp_error(format!("invalid file length {}", declared_words)))?;
        header.skip(4)?;
        let code = header.i32_le()?;
        let shape_type = ShapeType::from_code(code)
            .ok_or_else(|| shp_error(format!("unknown shape type {}", code)))?;
        header.rect()?;
        let z_range = [header.f64_le()?, header.f64_le()?];
        let m_range = [header.f64_le()?, header.f64_le()?];

        let end = declared_len.min(bytes.len());
        let mut shapes = Vec::new();
        let mut offset = FILE_HEADER_LEN;
        while offset + RECORD_HEADER_LEN <= end {
            let mut record_header = ByteReader::new(&bytes[offset..offset + RECORD_HEADER_LEN]);
            record_header.i32_be()?;
            let content_len = record_header.i32_be()?.max(0) as usize * 2;
            let start = offset + RECORD_HEADER_LEN;
            let content = bytes
                .get(start..start + content_len)
                .ok_or_else(|| shp_error(format!("record {} truncated", shapes.len() + 1)))?;
            shapes.push(Shape::decode(content)?);
            offset = start + content_len;
        }

        Ok(Self {
            shape_type,
            z_range,
            m_range,
            shapes,
        })
    }

    /// 產生 `.shp` 與 `.shx` 內容
    pub fn encode(&self) -> (Vec<u8>, Vec<u8>) {
        let bbox = bbox_of(
            self.shapes
                .iter()
                .filter_map(Shape::bbox)
                .flat_map(|r| [r.min(), r.max()]),
        );

        let mut records = Vec::new();
        let mut index = Vec::with_capacity(self.shapes.len() * 8);
        for (i, shape) in self.shapes.iter().enumerate() {
            let content = shape.encode();
            let offset_words = ((FILE_HEADER_LEN + records.len()) / 2) as i32;
            let content_words = (content.len() / 2) as i32;

            records.extend_from_slice(&(i as i32 + 1).to_be_bytes());
            records.extend_from_slice(&content_words.to_be_bytes());
            records.extend_from_slice(&content);

            index.extend_from_slice(&offset_words.to_be_bytes());
            index.extend_from_slice(&content_words.to_be_bytes());
        }

        let mut shp = self.header(FILE_HEADER_LEN + records.len(), bbox);
        shp.extend(records);
        let mut shx = self.header(FILE_HEADER_LEN + index.len(), bbox);
        shx.extend(index);
        (shp, shx)
    }

    fn header(&self, file_len: usize, bbox: Option<Rect<f64>>) -> Vec<u8> {
        let mut out = Vec::with_capacity(FILE_HEADER_LEN);
        out.extend_from_slice(&FILE_CODE.to_be_bytes());
        out.extend_from_slice(&[0u8; 20]);
        out.extend_from_slice(&((file_len / 2) as i32).to_be_bytes());
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&self.shape_type.code().to_le_bytes());
        write_rect(&mut out, bbox);
        for value in self.z_range.iter().chain(self.m_range.iter()) {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }
}

fn bbox_of(coords: impl Iterator<Item = Coord<f64>>) -> Option<Rect<f64>> {
    coords.fold(None, |acc: Option<Rect<f64>>, c| {
        Some(match acc {
            None => Rect::new(c, c),
            Some(r) => Rect::new(
                Coord {
                    x: r.min().x.min(c.x),
                    y: r.min().y.min(c.y),
                },
                Coord {
                    x: r.max().x.max(c.x),
                    y: r.max().y.max(c.y),
                },
            ),
        })
    })
}

fn write_rect(out: &mut Vec<u8>, rect: Option<Rect<f64>>) {
    let values = match rect {
        Some(r) => [r.min().x, r.min().y, r.max().x, r.max().y],
        None => [0.0; 4],
    };
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn write_measures(out: &mut Vec<u8>, values: &[f64]) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (min, max) = if values.is_empty() { (0.0, 0.0) } else { (min, max) };
    out.extend_from_slice(&min.to_le_bytes());
    out.extend_from_slice(&max.to_le_bytes());
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn shp_error(message: impl Into<String>) -> IngestError {
    IngestError::ShapefileError {
        file: ".shp".to_string(),
        message: message.into(),
    }
}

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self
            .buf
            .get(self.pos..self.pos + N)
            .ok_or_else(|| shp_error(format!("unexpected end of data at byte {}", self.pos)))?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        if self.pos + n > self.buf.len() {
            return Err(shp_error("unexpected end of data"));
        }
        self.pos += n;
        Ok(())
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn i32_le(&mut self) -> Result<i32> {
        self.take::<4>().map(i32::from_le_bytes)
    }

    fn i32_be(&mut self) -> Result<i32> {
        self.take::<4>().map(i32::from_be_bytes)
    }

    fn f64_le(&mut self) -> Result<f64> {
        self.take::<8>().map(f64::from_le_bytes)
    }

    fn count(&mut self) -> Result<usize> {
        let value = self.i32_le()?;
        usize::try_from(value).map_err(|_| shp_error(format!("negative count {}", value)))
    }

    fn rect(&mut self) -> Result<Rect<f64>> {
        let (xmin, ymin, xmax, ymax) = (self.f64_le()?, self.f64_le()?, self.f64_le()?, self.f64_le()?);
        Ok(Rect::new(Coord { x: xmin, y: ymin }, Coord { x: xmax, y: ymax }))
    }

    /// range（兩個 f64）加上 `n` 個值
    fn measures(&mut self, n: usize) -> Result<Vec<f64>> {
        self.skip(16)?;
        if n.checked_mul(8).map_or(true, |len| len > self.remaining()) {
            return Err(shp_error("unexpected end of data"));
        }
        (0..n).map(|_| self.f64_le()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Coord<f64>> {
        vec![
            Coord { x: x0, y: y0 },
            Coord { x: x0, y: y0 + size },
            Coord { x: x0 + size, y: y0 + size },
            Coord { x: x0 + size, y: y0 },
            Coord { x: x0, y: y0 },
        ]
    }

    #[test]
    fn test_encode_then_parse_keeps_records_and_order() {
        let file = ShpFile {
            shape_type: ShapeType::Polygon,
            z_range: [0.0; 2],
            m_range: [0.0; 2],
            shapes: vec![
                Shape::polygon(vec![square(0.0, 0.0, 1.0)]),
                Shape::Null,
                Shape::polygon(vec![square(5.0, 5.0, 2.0), square(5.5, 5.5, 0.5)]),
            ],
        };

        let (shp, shx) = file.encode();
        assert_eq!(shx.len(), FILE_HEADER_LEN + 3 * 8);
        assert_eq!(i32::from_be_bytes([shp[24], shp[25], shp[26], shp[27]]) as usize * 2, shp.len());

        let parsed = ShpFile::parse(&shp).unwrap();
        assert_eq!(parsed.shapes, file.shapes);
        assert!(parsed.shapes[1].is_empty());
        assert_eq!(parsed.shapes[2].vertex_count(), 10);

        // 檔頭 bbox 涵蓋所有非空紀錄
        let xmax = f64::from_le_bytes(shp[52..60].try_into().unwrap());
        assert_eq!(xmax, 7.0);
    }

    #[test]
    fn test_polygon_z_keeps_measures() {
        let mut part = Part::new(square(0.0, 0.0, 1.0));
        part.z = Some(vec![1.0, 2.0, 3.0, 4.0, 1.0]);
        let shape = Shape::Poly(PolyShape {
            shape_type: ShapeType::PolygonZ,
            parts: vec![part],
        });

        let decoded = Shape::decode(&shape.encode()).unwrap();
        let Shape::Poly(poly) = decoded else {
            panic!("expected poly shape");
        };
        assert_eq!(poly.parts[0].z.as_deref(), Some(&[1.0, 2.0, 3.0, 4.0, 1.0][..]));
        assert!(poly.parts[0].m.is_none());
    }

    #[test]
    fn test_points_pass_through_unchanged() {
        let point = Shape::point(2.5, 60.1);
        let decoded = Shape::decode(&point.encode()).unwrap();
        assert_eq!(decoded, point);
        assert_eq!(decoded.vertex_count(), 1);
    }

    #[test]
    fn test_empty_polygon_is_empty() {
        let shape = Shape::polygon(vec![]);
        let decoded = Shape::decode(&shape.encode()).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_truncated_record_is_rejected() {
        let file = ShpFile {
            shape_type: ShapeType::PolyLine,
            z_range: [0.0; 2],
            m_range: [0.0; 2],
            shapes: vec![Shape::polyline(vec![square(0.0, 0.0, 1.0)])],
        };
        let (mut shp, _) = file.encode();
        shp.truncate(shp.len() - 8);
        // 宣告長度仍為原長度
        assert!(ShpFile::parse(&shp).is_err());
        assert!(ShpFile::parse(&shp[..50]).is_err());
    }

    #[test]
    fn test_unknown_shape_type_is_rejected() {
        let content = 99i32.to_le_bytes();
        assert!(Shape::decode(&content).is_err());
    }

    fn one_polygon_file() -> Vec<u8> {
        let file = ShpFile {
            shape_type: ShapeType::Polygon,
            z_range: [0.0; 2],
            m_range: [0.0; 2],
            shapes: vec![Shape::polygon(vec![square(0.0, 0.0, 1.0)])],
        };
        file.encode().0
    }

    #[test]
    fn test_oversized_counts_are_rejected_without_allocating() {
        let mut shp = one_polygon_file();
        // numParts / numPoints 位於第一筆紀錄內容的 36..44
        shp[144..148].copy_from_slice(&i32::MAX.to_le_bytes());
        shp[148..152].copy_from_slice(&i32::MAX.to_le_bytes());

        let err = ShpFile::parse(&shp).unwrap_err();
        assert!(matches!(err, IngestError::ShapefileError { .. }));
    }

    #[test]
    fn test_negative_file_length_is_rejected() {
        let mut shp = one_polygon_file();
        shp[24..28].copy_from_slice(&(-1i32).to_be_bytes());

        assert!(matches!(
            ShpFile::parse(&shp),
            Err(IngestError::ShapefileError { .. })
        ));
    }
}
