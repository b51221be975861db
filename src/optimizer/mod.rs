//! 行程优化器
//!
//! 纯函数：输入兴趣点集合与行程天数，输出按天分组、天内有序的游览计划。
//! 三个阶段：容量受限的地理聚类（质心迭代至收敛或上限）→ 天内路线
//! （最近邻构造 + 两两交换改进）→ 按相邻质心距离贪心排列各天顺序。
//! 全程无随机数，同一输入必然得到同一输出。

use crate::config::OptimizerSection;
use crate::providers::PointOfInterest;

/// 优化器参数；测试与调用方显式构造，避免隐藏常量
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// 每天可安排的兴趣点数
    pub daily_capacity: usize,
    /// 聚类迭代上限
    pub kmeans_max_iters: usize,
    /// 路线交换改进的迭代上限
    pub route_swap_max_iters: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            daily_capacity: 3,
            kmeans_max_iters: 32,
            route_swap_max_iters: 64,
        }
    }
}

impl From<&OptimizerSection> for OptimizerConfig {
    fn from(section: &OptimizerSection) -> Self {
        Self {
            daily_capacity: section.daily_capacity,
            kmeans_max_iters: section.kmeans_max_iters,
            route_swap_max_iters: section.route_swap_max_iters,
        }
    }
}

/// 单日计划：route 为空表示自由活动日
#[derive(Debug, Clone, PartialEq)]
pub struct DayPlan {
    /// 1 起始的天序号
    pub day: usize,
    pub route: Vec<PointOfInterest>,
}

impl DayPlan {
    pub fn is_free_day(&self) -> bool {
        self.route.is_empty()
    }
}

/// 整趟行程计划
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItineraryPlan {
    pub days: Vec<DayPlan>,
    /// 超出总容量而被舍弃的低分兴趣点数量
    pub omitted: usize,
}

impl ItineraryPlan {
    pub fn total_pois(&self) -> usize {
        self.days.iter().map(|d| d.route.len()).sum()
    }
}

/// 大圆距离（公里）
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

fn poi_dist(a: &PointOfInterest, b: &PointOfInterest) -> f64 {
    haversine_km(a.latitude, a.longitude, b.latitude, b.longitude)
}

fn dist_to(poi: &PointOfInterest, centroid: (f64, f64)) -> f64 {
    haversine_km(poi.latitude, poi.longitude, centroid.0, centroid.1)
}

fn centroid_of(pois: &[PointOfInterest], members: &[usize]) -> (f64, f64) {
    if members.is_empty() {
        return (0.0, 0.0);
    }
    let n = members.len() as f64;
    let lat = members.iter().map(|&i| pois[i].latitude).sum::<f64>() / n;
    let lon = members.iter().map(|&i| pois[i].longitude).sum::<f64>() / n;
    (lat, lon)
}

/// 主入口：天数为零或无兴趣点时返回空计划，由调用方给出「无可规划」的答复
pub fn plan_itinerary(
    pois: &[PointOfInterest],
    trip_days: usize,
    cfg: &OptimizerConfig,
) -> ItineraryPlan {
    if trip_days == 0 || pois.is_empty() {
        return ItineraryPlan::default();
    }

    let capacity = cfg.daily_capacity.max(1);

    // 评分降序、同分按 id 升序：既保证确定性，又让容量超限时低分先出局
    let mut ranked: Vec<PointOfInterest> = pois.to_vec();
    ranked.sort_by(|a, b| b.rating.total_cmp(&a.rating).then_with(|| a.id.cmp(&b.id)));

    let total_capacity = trip_days.saturating_mul(capacity);
    let omitted = ranked.len().saturating_sub(total_capacity);
    ranked.truncate(total_capacity);

    let k = trip_days.min(ranked.len().div_ceil(capacity)).max(1);

    let clusters = cluster_capacity_bounded(&ranked, k, capacity, cfg.kmeans_max_iters);

    // 每个簇内先排路线，再按相邻质心距离排列各天
    let routed: Vec<Vec<PointOfInterest>> = clusters
        .iter()
        .map(|members| {
            let order = route_order(&ranked, members, cfg.route_swap_max_iters);
            order.into_iter().map(|i| ranked[i].clone()).collect()
        })
        .collect();

    let day_order = chain_days(&ranked, &clusters);

    let mut days: Vec<DayPlan> = day_order
        .into_iter()
        .enumerate()
        .map(|(day_idx, cluster_idx)| DayPlan {
            day: day_idx + 1,
            route: routed[cluster_idx].clone(),
        })
        .collect();

    // 兴趣点不足时，尾部的天退化为自由活动日
    while days.len() < trip_days {
        days.push(DayPlan {
            day: days.len() + 1,
            route: vec![],
        });
    }

    ItineraryPlan { days, omitted }
}

/// 容量受限的 k-means：质心迭代至分配不再变化或达到上限，保留方差最小的一轮
fn cluster_capacity_bounded(
    pois: &[PointOfInterest],
    k: usize,
    capacity: usize,
    max_iters: usize,
) -> Vec<Vec<usize>> {
    // 初始质心：最远点法，从排序后的首个（最高分）兴趣点出发
    let mut seeds: Vec<usize> = vec![0];
    while seeds.len() < k {
        let next = (0..pois.len())
            .filter(|i| !seeds.contains(i))
            .max_by(|&a, &b| {
                let da = seeds
                    .iter()
                    .map(|&s| poi_dist(&pois[a], &pois[s]))
                    .fold(f64::INFINITY, f64::min);
                let db = seeds
                    .iter()
                    .map(|&s| poi_dist(&pois[b], &pois[s]))
                    .fold(f64::INFINITY, f64::min);
                da.total_cmp(&db).then_with(|| b.cmp(&a))
            });
        match next {
            Some(idx) => seeds.push(idx),
            None => break,
        }
    }

    let mut centroids: Vec<(f64, f64)> = seeds
        .iter()
        .map(|&i| (pois[i].latitude, pois[i].longitude))
        .collect();

    let mut best: Option<(f64, Vec<Vec<usize>>)> = None;
    let mut prev_assignment: Vec<Vec<usize>> = vec![];

    for _ in 0..max_iters.max(1) {
        let assignment = assign_capacity_bounded(pois, &centroids, capacity);

        let variance: f64 = assignment
            .iter()
            .enumerate()
            .map(|(c, members)| {
                members
                    .iter()
                    .map(|&i| dist_to(&pois[i], centroids[c]).powi(2))
                    .sum::<f64>()
            })
            .sum();

        // 方差相同保留先到的一轮（严格小于才替换）
        if best.as_ref().map(|(v, _)| variance < *v).unwrap_or(true) {
            best = Some((variance, assignment.clone()));
        }

        if assignment == prev_assignment {
            break;
        }

        for (c, members) in assignment.iter().enumerate() {
            if !members.is_empty() {
                centroids[c] = centroid_of(pois, members);
            }
        }
        prev_assignment = assignment;
    }

    best.map(|(_, a)| a).unwrap_or_default()
}

/// 距离优先的贪心分配：所有 (点, 簇) 对按距离排序，点未分配且簇未满则成交
fn assign_capacity_bounded(
    pois: &[PointOfInterest],
    centroids: &[(f64, f64)],
    capacity: usize,
) -> Vec<Vec<usize>> {
    let mut pairs: Vec<(f64, usize, usize)> = Vec::with_capacity(pois.len() * centroids.len());
    for (i, poi) in pois.iter().enumerate() {
        for (c, &centroid) in centroids.iter().enumerate() {
            pairs.push((dist_to(poi, centroid), i, c));
        }
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut assignment: Vec<Vec<usize>> = vec![vec![]; centroids.len()];
    let mut assigned = vec![false; pois.len()];
    for (_, i, c) in pairs {
        if !assigned[i] && assignment[c].len() < capacity {
            assignment[c].push(i);
            assigned[i] = true;
        }
    }
    for members in &mut assignment {
        members.sort_unstable();
    }
    assignment
}

/// 天内路线：从离质心最近的点起最近邻串联，再做两两交换改进闭合路程
fn route_order(pois: &[PointOfInterest], members: &[usize], swap_max_iters: usize) -> Vec<usize> {
    if members.len() <= 1 {
        return members.to_vec();
    }

    let centroid = centroid_of(pois, members);
    let start = members
        .iter()
        .copied()
        .min_by(|&a, &b| {
            dist_to(&pois[a], centroid)
                .total_cmp(&dist_to(&pois[b], centroid))
                .then(a.cmp(&b))
        })
        .unwrap_or(members[0]);

    let mut route = vec![start];
    let mut remaining: Vec<usize> = members.iter().copied().filter(|&i| i != start).collect();
    while !remaining.is_empty() {
        let last = route[route.len() - 1];
        let (pos, _) = remaining
            .iter()
            .enumerate()
            .min_by(|(_, &a), (_, &b)| {
                poi_dist(&pois[last], &pois[a])
                    .total_cmp(&poi_dist(&pois[last], &pois[b]))
                    .then(a.cmp(&b))
            })
            .map(|(pos, &i)| (pos, i))
            .unwrap_or((0, remaining[0]));
        route.push(remaining.remove(pos));
    }

    // 两两交换：有改进就应用，整轮无改进或达到迭代上限即停
    let mut iters = 0;
    loop {
        let mut improved = false;
        'outer: for i in 0..route.len() {
            for j in (i + 1)..route.len() {
                iters += 1;
                let before = tour_len(pois, &route);
                route.swap(i, j);
                if tour_len(pois, &route) + 1e-9 < before {
                    improved = true;
                } else {
                    route.swap(i, j);
                }
                if iters >= swap_max_iters {
                    break 'outer;
                }
            }
        }
        if !improved || iters >= swap_max_iters {
            break;
        }
    }
    route
}

/// 闭合路程长度（回到起点）
fn tour_len(pois: &[PointOfInterest], route: &[usize]) -> f64 {
    if route.len() < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for w in route.windows(2) {
        total += poi_dist(&pois[w[0]], &pois[w[1]]);
    }
    total + poi_dist(&pois[route[route.len() - 1]], &pois[route[0]])
}

/// 以首个簇为第一天，按最近质心贪心串联其余各天
fn chain_days(pois: &[PointOfInterest], clusters: &[Vec<usize>]) -> Vec<usize> {
    if clusters.is_empty() {
        return vec![];
    }
    let centroids: Vec<(f64, f64)> = clusters.iter().map(|m| centroid_of(pois, m)).collect();

    let mut order = vec![0usize];
    let mut remaining: Vec<usize> = (1..clusters.len()).collect();
    while !remaining.is_empty() {
        let current = order[order.len() - 1];
        let (pos, _) = remaining
            .iter()
            .enumerate()
            .min_by(|(_, &a), (_, &b)| {
                let da = haversine_km(
                    centroids[current].0,
                    centroids[current].1,
                    centroids[a].0,
                    centroids[a].1,
                );
                let db = haversine_km(
                    centroids[current].0,
                    centroids[current].1,
                    centroids[b].0,
                    centroids[b].1,
                );
                da.total_cmp(&db).then(a.cmp(&b))
            })
            .map(|(pos, &c)| (pos, c))
            .unwrap_or((0, remaining[0]));
        order.push(remaining.remove(pos));
    }
    order
}
