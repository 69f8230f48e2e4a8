labeled_enum! {
    /// RAPL energy domains, in reporting order
    pub enum RaplDomain {
        Package => "Package energy",
        Pp0 => "PowerPlane0 (cores)",
        Dram => "DRAM",
    }
}
