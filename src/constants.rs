/// Column positions in the Companies House basic company data snapshot.
/// These are fixed by the upstream archive's schema; we only ever access
/// rows positionally.

// Registered office address fields
pub const COL_ADDRESS_LINE_1: usize = 4;
pub const COL_ADDRESS_LINE_2: usize = 5;
pub const COL_POST_TOWN: usize = 6;
pub const COL_POSTCODE: usize = 9;

// Candidate "valid as of" date fields
pub const COL_INCORPORATION_DATE: usize = 14;
pub const COL_ACCOUNTS_LAST_MADE_UP: usize = 18;
pub const COL_RETURNS_LAST_MADE_UP: usize = 21;

/// Companies House bulk download site.
pub const ROOT_DOMAIN: &str = "http://download.companieshouse.gov.uk";

/// Default endpoint of the Sorting Office address normalization service.
pub const DEFAULT_RESOLVER_ENDPOINT: &str = "http://sorting-office.openaddressesuk.org/address";

/// Repository cited as the processing script in emitted provenance.
pub const PROCESSING_SCRIPT_REPO: &str = "https://github.com/oa-bots/companies_house";
