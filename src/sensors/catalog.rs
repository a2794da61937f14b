// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Known ifm electronic device types that have no process-data codec yet

/// IO-Link vendor id of ifm electronic gmbh
pub const IFM_VENDOR_ID: u32 = 310;

/// A device type the daemon recognises but cannot decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsupportedType {
    pub vendor_id: u32,
    pub device_id: u32,
    /// Product codes sharing this device id
    pub products: &'static str,
}

const fn ifm(device_id: u32, products: &'static str) -> UnsupportedType {
    UnsupportedType {
        vendor_id: IFM_VENDOR_ID,
        device_id,
        products,
    }
}

/// ifm device ids seen in the field, grouped by product family
pub const UNSUPPORTED_TYPES: &[UnsupportedType] = &[
    // Pressure sensors
    ifm(399, "PN7570, PN7070"),
    ifm(400, "PN7571, PN7071"),
    ifm(401, "PN7592, PN7572, PN7092, PN7072"),
    ifm(402, "PN7593, PN7093"),
    ifm(403, "PN7594, PN7094"),
    ifm(404, "PN7596, PN7096"),
    ifm(406, "PN7599, PN7099"),
    ifm(427, "PN3070, PN3570"),
    ifm(428, "PN3071, PN3571"),
    ifm(429, "PN3092, PN3592"),
    ifm(430, "PN3093, PN3593"),
    ifm(431, "PN3094, PN3594"),
    ifm(454, "PN7694, PN7294"),
    ifm(459, "PN2070, PN2570"),
    ifm(461, "PN2092, PN2592"),
    ifm(462, "PN2093, PN2593"),
    ifm(463, "PN2094, PN2594"),
    ifm(473, "PN2294, PN2694"),
    ifm(311, "PN7004, PE7004, PN014A"),
    ifm(312, "PN7006, PE7006, PN016A"),
    // Pressure transmitters
    ifm(156, "PI2793, PI2893, PI2203, PI2303"),
    ifm(157, "PI2794, PY2794, PI2894, PI2204, PI2214, PI2304"),
    ifm(158, "PI2795, PI2895, PI2205, PI2305"),
    ifm(159, "PI2796, PI2896, PI2206, PI2306"),
    ifm(256, "PI2797, PI2897, PI2207, PI2307"),
    ifm(257, "PI2798, PI2898"),
    ifm(258, "PI2799, PI2899, PI2209, PI2309"),
    ifm(259, "PI2789, PI2889"),
    // Level sensors
    ifm(2, "PP7550, PP000E"),
    ifm(3, "PP7551, PP001E"),
    ifm(4, "PP7552, PP002E"),
    ifm(5, "PP7553, PP003E"),
    ifm(6, "PP7554, PP004E"),
    ifm(7, "PP7556"),
    // Vacuum sensors
    ifm(708, "PV7000"),
    ifm(709, "PV7001"),
    ifm(710, "PV7002"),
    ifm(711, "PV7023"),
    ifm(712, "PV7003"),
    ifm(713, "PV7004"),
    ifm(851, "PV7600"),
    ifm(852, "PV7601"),
    ifm(853, "PV7602"),
    ifm(854, "PV7603"),
    ifm(855, "PV7604"),
    ifm(899, "PV7623"),
    // Pneumatic pressure
    ifm(366, "PQ3809"),
    ifm(367, "PQ3834"),
    // Magnetic-inductive flow meters
    ifm(389, "SM2000, SM2100, SM2400, SM2500"),
    ifm(390, "SM2001, SM2601"),
    ifm(391, "SM9000, SM9100, SM9400, SM9500"),
    ifm(392, "SM9001, SM9601"),
    ifm(509, "SM0510"),
    ifm(569, "SM6000, SM6100, SM6400, SM6500"),
    ifm(570, "SM6001, SM6601"),
    ifm(572, "SM7000, SM7100, SM7400, SM7500"),
    ifm(573, "SM7001, SM7601"),
    ifm(575, "SM8000, SM8100, SM8400, SM8500"),
    ifm(576, "SM8001, SM8601"),
    ifm(577, "SM8050"),
    ifm(671, "SM4000, SM4100"),
    // Vortex flow meters
    ifm(484, "SV4200, SV4500"),
    ifm(486, "SV4610"),
    ifm(488, "SV5200, SV5500"),
    ifm(490, "SV5610"),
    ifm(492, "SV7200, SV7500"),
    ifm(494, "SV7610"),
    // Flow monitors
    ifm(533, "SA5030, SA5040, SA2000, SA5000, SA4100, SA4300"),
];
