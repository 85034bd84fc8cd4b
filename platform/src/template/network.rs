use crate::config::VpcConfig;
use crate::template::CfnResource;
use serde_json::{json, Value};

const VPC_CIDR: &str = "172.16.0.0/16";

/// Typed network outputs consumed by downstream components
///
/// Carries logical names only; consumers turn them into Ref/GetAtt tokens.
#[derive(Clone, Debug)]
pub struct NetworkHandle {
    vpc: String,
    public_subnets: Vec<String>,
    private_subnets: Vec<String>,
}

impl NetworkHandle {
    pub fn vpc_id(&self) -> Value {
        json!({ "Ref": self.vpc })
    }

    pub fn vpc_cidr(&self) -> &'static str {
        VPC_CIDR
    }

    pub fn public_subnet_ids(&self) -> Vec<Value> {
        self.public_subnets.iter().map(|s| json!({ "Ref": s })).collect()
    }

    pub fn private_subnet_ids(&self) -> Vec<Value> {
        self.private_subnets.iter().map(|s| json!({ "Ref": s })).collect()
    }
}

/// Isolated virtual network with a public and a private-with-egress tier
///
/// Private subnets never get a route to the internet gateway; their only
/// egress is the NAT. Sizing is validated with the rest of the
/// configuration, before any resource group is built.
pub struct Network {
    handle: NetworkHandle,
    resources: Vec<CfnResource>,
}

impl Network {
    pub fn new(config: &VpcConfig) -> Self {
        let azs = config.max_azs as usize;
        let mut resources = vec![
            CfnResource::new(
                "Vpc",
                json!({
                    "Type": "AWS::EC2::VPC",
                    "Properties": {
                        "CidrBlock": VPC_CIDR,
                        "EnableDnsSupport": true,
                        "EnableDnsHostnames": true
                    }
                }),
            ),
            CfnResource::new(
                "InternetGateway",
                json!({ "Type": "AWS::EC2::InternetGateway" }),
            ),
            CfnResource::new(
                "VpcGatewayAttachment",
                json!({
                    "Type": "AWS::EC2::VPCGatewayAttachment",
                    "Properties": {
                        "VpcId": { "Ref": "Vpc" },
                        "InternetGatewayId": { "Ref": "InternetGateway" }
                    }
                }),
            ),
            CfnResource::new(
                "PublicRouteTable",
                json!({
                    "Type": "AWS::EC2::RouteTable",
                    "Properties": { "VpcId": { "Ref": "Vpc" } }
                }),
            ),
            // The route is not valid until the gateway is attached
            CfnResource::new(
                "PublicInternetRoute",
                json!({
                    "Type": "AWS::EC2::Route",
                    "Properties": {
                        "RouteTableId": { "Ref": "PublicRouteTable" },
                        "DestinationCidrBlock": "0.0.0.0/0",
                        "GatewayId": { "Ref": "InternetGateway" }
                    }
                }),
            )
            .depends_on("VpcGatewayAttachment"),
        ];

        let mut public_subnets = Vec::with_capacity(azs);
        let mut private_subnets = Vec::with_capacity(azs);

        for az in 0..azs {
            let name = format!("PublicSubnet{}", az + 1);

            resources.push(CfnResource::new(
                &name,
                json!({
                    "Type": "AWS::EC2::Subnet",
                    "Properties": {
                        "VpcId": { "Ref": "Vpc" },
                        "CidrBlock": subnet_cidr(az),
                        "AvailabilityZone": { "Fn::Select": [az, { "Fn::GetAZs": "" }] },
                        "MapPublicIpOnLaunch": true
                    }
                }),
            ));

            resources.push(CfnResource::new(
                &format!("PublicSubnet{}RouteTableAssociation", az + 1),
                json!({
                    "Type": "AWS::EC2::SubnetRouteTableAssociation",
                    "Properties": {
                        "SubnetId": { "Ref": name.clone() },
                        "RouteTableId": { "Ref": "PublicRouteTable" }
                    }
                }),
            ));

            public_subnets.push(name);
        }

        for nat in 0..config.nat_gateways as usize {
            resources.push(CfnResource::new(
                &format!("NatEip{}", nat + 1),
                json!({
                    "Type": "AWS::EC2::EIP",
                    "Properties": { "Domain": "vpc" }
                }),
            ));

            resources.push(
                CfnResource::new(
                    &format!("NatGateway{}", nat + 1),
                    json!({
                        "Type": "AWS::EC2::NatGateway",
                        "Properties": {
                            "AllocationId": { "Fn::GetAtt": [format!("NatEip{}", nat + 1), "AllocationId"] },
                            "SubnetId": { "Ref": public_subnets[nat].clone() }
                        }
                    }),
                )
                .depends_on("VpcGatewayAttachment"),
            );
        }

        for az in 0..azs {
            let name = format!("PrivateSubnet{}", az + 1);
            let route_table = format!("PrivateRouteTable{}", az + 1);
            let nat = az % config.nat_gateways as usize + 1;

            resources.push(CfnResource::new(
                &name,
                json!({
                    "Type": "AWS::EC2::Subnet",
                    "Properties": {
                        "VpcId": { "Ref": "Vpc" },
                        "CidrBlock": subnet_cidr(azs + az),
                        "AvailabilityZone": { "Fn::Select": [az, { "Fn::GetAZs": "" }] }
                    }
                }),
            ));

            resources.push(CfnResource::new(
                &route_table,
                json!({
                    "Type": "AWS::EC2::RouteTable",
                    "Properties": { "VpcId": { "Ref": "Vpc" } }
                }),
            ));

            // Outbound only, via NAT. No route to the internet gateway.
            resources.push(CfnResource::new(
                &format!("PrivateEgressRoute{}", az + 1),
                json!({
                    "Type": "AWS::EC2::Route",
                    "Properties": {
                        "RouteTableId": { "Ref": route_table.clone() },
                        "DestinationCidrBlock": "0.0.0.0/0",
                        "NatGatewayId": { "Ref": format!("NatGateway{nat}") }
                    }
                }),
            ));

            resources.push(CfnResource::new(
                &format!("PrivateSubnet{}RouteTableAssociation", az + 1),
                json!({
                    "Type": "AWS::EC2::SubnetRouteTableAssociation",
                    "Properties": {
                        "SubnetId": { "Ref": name.clone() },
                        "RouteTableId": { "Ref": route_table }
                    }
                }),
            ));

            private_subnets.push(name);
        }

        Network {
            handle: NetworkHandle {
                vpc: "Vpc".to_string(),
                public_subnets,
                private_subnets,
            },
            resources,
        }
    }

    pub fn into_parts(self) -> (NetworkHandle, Vec<CfnResource>) {
        (self.handle, self.resources)
    }
}

/// The nth /22 slice of the VPC address range
fn subnet_cidr(index: usize) -> String {
    format!("172.16.{}.0/22", index * 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> (NetworkHandle, Vec<CfnResource>) {
        Network::new(&VpcConfig {
            max_azs: 3,
            nat_gateways: 1,
        })
        .into_parts()
    }

    #[test]
    fn two_tiers_per_az() {
        let (handle, _) = network();
        assert_eq!(handle.public_subnet_ids().len(), 3);
        assert_eq!(handle.private_subnet_ids().len(), 3);
    }

    #[test]
    fn subnet_ranges_do_not_overlap() {
        let (_, resources) = network();

        let mut cidrs: Vec<String> = resources
            .iter()
            .filter(|r| r.resource["Type"] == "AWS::EC2::Subnet")
            .map(|r| r.resource["Properties"]["CidrBlock"].as_str().expect("cidr").to_string())
            .collect();

        let total = cidrs.len();
        cidrs.dedup();
        assert_eq!(cidrs.len(), total);
        assert_eq!(cidrs[0], "172.16.0.0/22");
    }

    #[test]
    fn private_subnets_never_route_to_the_internet_gateway() {
        let (_, resources) = network();

        for route in resources.iter().filter(|r| {
            r.resource["Type"] == "AWS::EC2::Route" && r.name.starts_with("PrivateEgressRoute")
        }) {
            assert!(route.resource["Properties"]["GatewayId"].is_null(), "{}", route.name);
            assert!(
                route.resource["Properties"]["NatGatewayId"].is_object(),
                "{}",
                route.name
            );
        }
    }

    #[test]
    fn public_tier_routes_through_the_internet_gateway() {
        let (_, resources) = network();

        let route = resources
            .iter()
            .find(|r| r.name == "PublicInternetRoute")
            .expect("route");

        assert_eq!(route.resource["Properties"]["GatewayId"]["Ref"], "InternetGateway");
        assert_eq!(route.depends_on, vec!["VpcGatewayAttachment"]);
    }

    #[test]
    fn private_subnets_share_the_single_nat() {
        let (_, resources) = network();

        let nats: Vec<&str> = resources
            .iter()
            .filter(|r| r.name.starts_with("PrivateEgressRoute"))
            .map(|r| r.resource["Properties"]["NatGatewayId"]["Ref"].as_str().expect("ref"))
            .collect();

        assert_eq!(nats, vec!["NatGateway1"; 3]);
    }

    #[test]
    fn public_subnets_map_public_ips() {
        let (_, resources) = network();

        let public = resources.iter().find(|r| r.name == "PublicSubnet1").expect("subnet");
        assert_eq!(public.resource["Properties"]["MapPublicIpOnLaunch"], true);

        let private = resources.iter().find(|r| r.name == "PrivateSubnet1").expect("subnet");
        assert!(private.resource["Properties"]["MapPublicIpOnLaunch"].is_null());
    }
}
