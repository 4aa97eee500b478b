//! Block and item classification by registry name.

use craftbot_core::{EquipSlot, Item};

/// Every natural log block. Stripped logs are never harvested.
pub const LOG_BLOCKS: &[&str] = &[
    "oak_log",
    "spruce_log",
    "birch_log",
    "jungle_log",
    "acacia_log",
    "dark_oak_log",
    "mangrove_log",
    "cherry_log",
    "pale_oak_log",
];

pub const ORE_BLOCKS: &[&str] = &[
    "coal_ore",
    "iron_ore",
    "copper_ore",
    "gold_ore",
    "redstone_ore",
    "lapis_ore",
    "diamond_ore",
    "emerald_ore",
    "deepslate_coal_ore",
    "deepslate_iron_ore",
    "deepslate_copper_ore",
    "deepslate_gold_ore",
    "deepslate_redstone_ore",
    "deepslate_lapis_ore",
    "deepslate_diamond_ore",
    "deepslate_emerald_ore",
    "nether_gold_ore",
    "nether_quartz_ore",
];

/// Axes good enough for chopping, weakest first.
const AXES: &[&str] = &[
    "golden_axe",
    "stone_axe",
    "iron_axe",
    "diamond_axe",
    "netherite_axe",
];

const PICKAXES: &[&str] = &[
    "wooden_pickaxe",
    "golden_pickaxe",
    "stone_pickaxe",
    "iron_pickaxe",
    "diamond_pickaxe",
    "netherite_pickaxe",
];

/// Edible items, most preferred first.
const FOODS: &[&str] = &[
    "cooked_beef",
    "cooked_porkchop",
    "cooked_mutton",
    "cooked_chicken",
    "cooked_salmon",
    "cooked_cod",
    "baked_potato",
    "bread",
    "golden_carrot",
    "apple",
    "carrot",
];

/// Armor and weapon materials, weakest first.
const MATERIALS: &[&str] = &[
    "leather", "wooden", "golden", "chainmail", "stone", "iron", "turtle", "diamond", "netherite",
];

pub fn is_log(name: &str) -> bool {
    name.ends_with("_log") && !name.contains("stripped")
}

pub fn is_leaves(name: &str) -> bool {
    name.contains("leaves")
}

pub fn is_ore(name: &str) -> bool {
    name.ends_with("_ore")
}

pub fn is_food(name: &str) -> bool {
    FOODS.contains(&name) || name.contains("steak")
}

/// Total number of harvestable logs in `items`.
pub fn log_count(items: &[Item]) -> u32 {
    items
        .iter()
        .filter(|i| is_log(&i.name))
        .map(|i| i.count)
        .sum()
}

fn best_of<'a>(items: &'a [Item], ranking: &[&str]) -> Option<&'a Item> {
    items
        .iter()
        .filter_map(|i| ranking.iter().position(|r| *r == i.name).map(|rank| (rank, i)))
        .max_by_key(|(rank, _)| *rank)
        .map(|(_, i)| i)
}

/// At least a stone-tier axe (golden counts).
pub fn best_axe(items: &[Item]) -> Option<&Item> {
    best_of(items, AXES)
}

pub fn best_pickaxe(items: &[Item]) -> Option<&Item> {
    best_of(items, PICKAXES)
}

pub fn best_food(items: &[Item]) -> Option<&Item> {
    items
        .iter()
        .filter(|i| is_food(&i.name))
        .min_by_key(|i| FOODS.iter().position(|f| *f == i.name).unwrap_or(FOODS.len()))
}

fn material_rank(name: &str) -> Option<usize> {
    let material = name.split('_').next()?;
    MATERIALS.iter().position(|m| *m == material)
}

/// Which slot an armor piece belongs in.
pub fn armor_slot(name: &str) -> Option<EquipSlot> {
    if name.ends_with("_helmet") {
        Some(EquipSlot::Head)
    } else if name.ends_with("_chestplate") {
        Some(EquipSlot::Torso)
    } else if name.ends_with("_leggings") {
        Some(EquipSlot::Legs)
    } else if name.ends_with("_boots") {
        Some(EquipSlot::Feet)
    } else {
        None
    }
}

/// The best armor piece per slot plus the best sword for the hand.
pub fn best_gear(items: &[Item]) -> Vec<(Item, EquipSlot)> {
    let mut picks: Vec<(usize, Item, EquipSlot)> = Vec::new();

    for item in items {
        let slot = match armor_slot(&item.name) {
            Some(slot) => slot,
            None if item.name.ends_with("_sword") => EquipSlot::Hand,
            None => continue,
        };
        let Some(rank) = material_rank(&item.name) else {
            continue;
        };

        match picks.iter_mut().find(|(_, _, s)| *s == slot) {
            Some(existing) if existing.0 < rank => *existing = (rank, item.clone(), slot),
            Some(_) => {}
            None => picks.push((rank, item.clone(), slot)),
        }
    }

    picks.into_iter().map(|(_, item, slot)| (item, slot)).collect()
}
