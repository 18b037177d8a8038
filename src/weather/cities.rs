/// A city with a known OpenWeatherMap id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CityEntry {
    pub name_zh: &'static str,
    pub name_en: &'static str,
    pub id: u32,
}

// Name lookups for these are unreliable upstream, so they are queried by id.
const CITIES: &[CityEntry] = &[
    CityEntry { name_zh: "北京", name_en: "Beijing", id: 1_816_670 },
    CityEntry { name_zh: "上海", name_en: "Shanghai", id: 1_796_236 },
    CityEntry { name_zh: "广州", name_en: "Guangzhou", id: 1_809_858 },
    CityEntry { name_zh: "深圳", name_en: "Shenzhen", id: 1_795_565 },
    CityEntry { name_zh: "成都", name_en: "Chengdu", id: 1_815_286 },
    CityEntry { name_zh: "重庆", name_en: "Chongqing", id: 1_814_906 },
    CityEntry { name_zh: "杭州", name_en: "Hangzhou", id: 1_808_926 },
    CityEntry { name_zh: "武汉", name_en: "Wuhan", id: 1_791_247 },
    CityEntry { name_zh: "西安", name_en: "Xian", id: 1_790_630 },
    CityEntry { name_zh: "南京", name_en: "Nanjing", id: 1_799_962 },
    CityEntry { name_zh: "天津", name_en: "Tianjin", id: 1_792_947 },
    CityEntry { name_zh: "苏州", name_en: "Suzhou", id: 1_795_940 },
    CityEntry { name_zh: "郑州", name_en: "Zhengzhou", id: 1_784_658 },
    CityEntry { name_zh: "长沙", name_en: "Changsha", id: 1_815_577 },
    CityEntry { name_zh: "青岛", name_en: "Qingdao", id: 1_797_929 },
    CityEntry { name_zh: "沈阳", name_en: "Shenyang", id: 2_034_937 },
    CityEntry { name_zh: "大连", name_en: "Dalian", id: 1_814_087 },
    CityEntry { name_zh: "厦门", name_en: "Xiamen", id: 1_790_923 },
    CityEntry { name_zh: "济南", name_en: "Jinan", id: 1_805_753 },
];

/// Find a city by Chinese name or case-insensitive English name.
pub fn lookup_city(name: &str) -> Option<&'static CityEntry> {
    let name = name.trim();
    CITIES
        .iter()
        .find(|c| c.name_zh == name || c.name_en.eq_ignore_ascii_case(name))
}
