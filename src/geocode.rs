//! Coarse geocoding of free-text Korean addresses to city/district centroids.
//!
//! Resolution is substring matching against two static tables. The tables are
//! declared most-specific first, so the first hit is the longest useful match:
//! full metropolitan names, then cities, then provinces, then bare metropolitan
//! short names. District names that exist in more than one city (중구, 동구,
//! 서구, 남구, 북구, 강서구) are left out since a bare match would be a guess.

use crate::data::models::Location;

/// Seoul City Hall, used when nothing in the address is recognized.
pub const DEFAULT_CENTROID: (f64, f64) = (37.5665, 126.9780);

/// A named centroid.
#[derive(Debug, Clone, Copy)]
pub struct Centroid {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

const fn c(name: &'static str, lat: f64, lng: f64) -> Centroid {
    Centroid { name, lat, lng }
}

static REGIONS: &[Centroid] = &[
    // Metropolitan and special cities, official names
    c("서울특별시", 37.5665, 126.9780),
    c("부산광역시", 35.1796, 129.0756),
    c("대구광역시", 35.8714, 128.6014),
    c("인천광역시", 37.4563, 126.7052),
    c("광주광역시", 35.1595, 126.8526),
    c("대전광역시", 36.3504, 127.3845),
    c("울산광역시", 35.5384, 129.3114),
    c("세종특별자치시", 36.4800, 127.2890),
    // Cities
    c("수원", 37.2636, 127.0286),
    c("성남", 37.4201, 127.1265),
    c("고양", 37.6584, 126.8320),
    c("용인", 37.2411, 127.1776),
    c("부천", 37.5034, 126.7660),
    c("안산", 37.3219, 126.8309),
    c("안양", 37.3943, 126.9568),
    c("남양주", 37.6360, 127.2165),
    c("화성", 37.1995, 126.8312),
    c("평택", 36.9921, 127.1129),
    c("의정부", 37.7381, 127.0337),
    c("파주", 37.7599, 126.7800),
    c("김포", 37.6153, 126.7156),
    c("춘천", 37.8813, 127.7298),
    c("원주", 37.3422, 127.9202),
    c("청주", 36.6424, 127.4890),
    c("천안", 36.8151, 127.1139),
    c("전주", 35.8242, 127.1480),
    c("포항", 36.0190, 129.3435),
    c("창원", 35.2280, 128.6811),
    c("김해", 35.2285, 128.8894),
    // Provinces
    c("경기도", 37.4138, 127.5183),
    c("경기", 37.4138, 127.5183),
    c("강원", 37.8228, 128.1555),
    c("충청북도", 36.6357, 127.4917),
    c("충북", 36.6357, 127.4917),
    c("충청남도", 36.5184, 126.8000),
    c("충남", 36.5184, 126.8000),
    c("전라북도", 35.7175, 127.1530),
    c("전북", 35.7175, 127.1530),
    c("전라남도", 34.8161, 126.4629),
    c("전남", 34.8161, 126.4629),
    c("경상북도", 36.4919, 128.8889),
    c("경북", 36.4919, 128.8889),
    c("경상남도", 35.4606, 128.2132),
    c("경남", 35.4606, 128.2132),
    c("제주", 33.4996, 126.5312),
    // Metropolitan short names
    c("서울", 37.5665, 126.9780),
    c("부산", 35.1796, 129.0756),
    c("대구", 35.8714, 128.6014),
    c("인천", 37.4563, 126.7052),
    c("광주", 35.1595, 126.8526),
    c("대전", 36.3504, 127.3845),
    c("울산", 35.5384, 129.3114),
    c("세종", 36.4800, 127.2890),
];

static DISTRICTS: &[Centroid] = &[
    // Seoul
    c("종로구", 37.5735, 126.9790),
    c("용산구", 37.5326, 126.9905),
    c("성동구", 37.5634, 127.0369),
    c("광진구", 37.5385, 127.0823),
    c("동대문구", 37.5744, 127.0396),
    c("중랑구", 37.6063, 127.0925),
    c("성북구", 37.5894, 127.0167),
    c("강북구", 37.6396, 127.0257),
    c("도봉구", 37.6688, 127.0471),
    c("노원구", 37.6542, 127.0568),
    c("은평구", 37.6027, 126.9291),
    c("서대문구", 37.5791, 126.9368),
    c("마포구", 37.5663, 126.9019),
    c("양천구", 37.5170, 126.8665),
    c("구로구", 37.4954, 126.8874),
    c("금천구", 37.4569, 126.8955),
    c("영등포구", 37.5264, 126.8962),
    c("동작구", 37.5124, 126.9393),
    c("관악구", 37.4784, 126.9516),
    c("서초구", 37.4837, 127.0324),
    c("강남구", 37.5172, 127.0473),
    c("송파구", 37.5145, 127.1066),
    c("강동구", 37.5301, 127.1238),
    // Busan
    c("해운대구", 35.1631, 129.1636),
    c("부산진구", 35.1629, 129.0532),
    c("동래구", 35.2049, 129.0837),
    c("사하구", 35.1046, 128.9749),
    c("금정구", 35.2429, 129.0922),
    c("연제구", 35.1762, 129.0799),
    c("수영구", 35.1455, 129.1133),
    c("사상구", 35.1527, 128.9910),
    c("영도구", 35.0911, 129.0679),
    c("기장군", 35.2445, 129.2222),
    // Incheon
    c("연수구", 37.4103, 126.6783),
    c("남동구", 37.4473, 126.7314),
    c("부평구", 37.5070, 126.7219),
    c("계양구", 37.5372, 126.7376),
    c("미추홀구", 37.4635, 126.6506),
    // Daegu
    c("수성구", 35.8581, 128.6306),
    c("달서구", 35.8299, 128.5326),
    // Gyeonggi
    c("분당구", 37.3827, 127.1189),
    c("수지구", 37.3222, 127.0977),
    c("일산동구", 37.6587, 126.7750),
    c("일산서구", 37.6750, 126.7508),
];

/// Resolves address text against immutable region and district tables.
#[derive(Debug, Clone, Copy)]
pub struct AddressResolver {
    regions: &'static [Centroid],
    districts: &'static [Centroid],
    fallback: (f64, f64),
}

impl Default for AddressResolver {
    fn default() -> Self {
        Self {
            regions: REGIONS,
            districts: DISTRICTS,
            fallback: DEFAULT_CENTROID,
        }
    }
}

impl AddressResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `address` to a centroid. Always returns a location; the
    /// returned `address` is the input text, not the matched table name.
    ///
    /// A district match wins over a region match, a region match wins over
    /// the fallback centroid.
    pub fn resolve(&self, address: &str) -> Location {
        let (lat, lng) = match self.find(self.regions, address) {
            Some(region) => self
                .find(self.districts, address)
                .map_or((region.lat, region.lng), |d| (d.lat, d.lng)),
            None => self
                .find(self.districts, address)
                .map_or(self.fallback, |d| (d.lat, d.lng)),
        };

        Location {
            lat,
            lng,
            address: address.to_string(),
        }
    }

    fn find(&self, table: &'static [Centroid], address: &str) -> Option<&'static Centroid> {
        table.iter().find(|entry| address.contains(entry.name))
    }
}
